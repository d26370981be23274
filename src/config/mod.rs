//! Run configuration.
//!
//! Layered merge, most specific wins:
//! 1. Built-in defaults
//! 2. Environment variables (`REGSWEEP_*`)
//! 3. Config file (`regsweep.toml`)
//! 4. CLI flags (applied by the binary)

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::executor::DEFAULT_CONCURRENCY;

/// Environment variable names.
pub mod env_vars {
    pub const DRY_RUN: &str = "REGSWEEP_DRY_RUN";
    pub const CONCURRENCY: &str = "REGSWEEP_CONCURRENCY";
    pub const VERBOSE: &str = "REGSWEEP_VERBOSE";
    pub const REPORT_DIR: &str = "REGSWEEP_REPORT_DIR";
}

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Effective run configuration after the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// When false, the run is a dry-run (the default)
    pub execute: bool,

    /// Deletion worker count
    pub concurrency: usize,

    /// Per-repository progress lines on stderr
    pub verbose: bool,

    /// Directory for run reports
    pub report_dir: PathBuf,

    /// Optional retention policy file
    pub policy_path: Option<PathBuf>,

    /// Repository include patterns (empty = all)
    pub repo_globs: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            execute: false,
            concurrency: DEFAULT_CONCURRENCY,
            verbose: false,
            report_dir: PathBuf::from("reports"),
            policy_path: None,
            repo_globs: vec![],
        }
    }
}

/// Config file schema: every field optional, absent fields keep the
/// previous layer's value.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub execute: Option<bool>,
    pub concurrency: Option<usize>,
    pub verbose: Option<bool>,
    pub report_dir: Option<PathBuf>,
    pub policy: Option<PathBuf>,
    #[serde(default)]
    pub repos: Vec<String>,
}

impl RunConfig {
    /// Build the configuration from defaults, environment, and an optional
    /// config file. CLI flags are layered on top by the binary.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        if let Some(path) = config_path {
            let file = Self::read_file(path)?;
            config.apply_file(file);
        }
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(execute) = file.execute {
            self.execute = execute;
        }
        if let Some(concurrency) = file.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(verbose) = file.verbose {
            self.verbose = verbose;
        }
        if let Some(report_dir) = file.report_dir {
            self.report_dir = report_dir;
        }
        if let Some(policy) = file.policy {
            self.policy_path = Some(policy);
        }
        if !file.repos.is_empty() {
            self.repo_globs = file.repos;
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(dry_run) = read_env_bool(env_vars::DRY_RUN)? {
            self.execute = !dry_run;
        }
        if let Some(text) = read_env(env_vars::CONCURRENCY) {
            self.concurrency =
                text.parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: env_vars::CONCURRENCY.to_string(),
                        reason: format!("'{text}' is not an integer"),
                    })?;
        }
        if let Some(verbose) = read_env_bool(env_vars::VERBOSE)? {
            self.verbose = verbose;
        }
        if let Some(dir) = read_env(env_vars::REPORT_DIR) {
            self.report_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Compile the repository include patterns, `None` when unrestricted.
    pub fn repo_filter(&self) -> Result<Option<GlobSet>, ConfigError> {
        if self.repo_globs.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.repo_globs {
            let glob = Glob::new(pattern).map_err(|err| ConfigError::InvalidValue {
                field: "repos".to_string(),
                reason: format!("bad pattern '{pattern}': {err}"),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|err| ConfigError::InvalidValue {
            field: "repos".to_string(),
            reason: err.to_string(),
        })?;
        Ok(Some(set))
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    match read_env(name) {
        None => Ok(None),
        Some(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            other => Err(ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("'{other}' is not a boolean"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert!(!config.execute);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.report_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file: ConfigFile = toml::from_str(
            r#"
            execute = true
            concurrency = 8
            repos = ["team-*"]
            policy = "retention.toml"
            "#,
        )
        .unwrap();

        let mut config = RunConfig::default();
        config.apply_file(file);

        assert!(config.execute);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.repo_globs, vec!["team-*".to_string()]);
        assert_eq!(config.policy_path, Some(PathBuf::from("retention.toml")));
        // Untouched fields keep defaults
        assert!(!config.verbose);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = RunConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_repo_filter_empty_means_unrestricted() {
        let config = RunConfig::default();
        assert!(config.repo_filter().unwrap().is_none());
    }

    #[test]
    fn test_repo_filter_matches_globs() {
        let mut config = RunConfig::default();
        config.repo_globs = vec!["team-*".to_string(), "infra/*".to_string()];

        let filter = config.repo_filter().unwrap().unwrap();
        assert!(filter.is_match("team-app-dev"));
        assert!(filter.is_match("infra/cache"));
        assert!(!filter.is_match("other-app"));
    }

    #[test]
    fn test_bad_glob_rejected() {
        let mut config = RunConfig::default();
        config.repo_globs = vec!["a[".to_string()];
        assert!(config.repo_filter().is_err());
    }
}
