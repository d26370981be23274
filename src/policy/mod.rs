//! Retention policy table.
//!
//! Pure data: per-tier untagged-age thresholds and tagged-count caps,
//! loaded once per run and immutable afterwards. The loader rejects any
//! table where a less conservative tier keeps more than a more
//! conservative one, so a misordered configuration never reaches the
//! decision engine. The SHA-256 of the canonical JSON snapshot is recorded
//! in every run report for audit replay.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::Tier;

/// Retention rules for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Untagged images older than this many days are eligible for deletion
    pub untagged_max_age_days: u32,

    /// Maximum number of tagged images to retain (None = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagged_keep_count: Option<u32>,
}

impl RetentionPolicy {
    /// The untagged age threshold as a duration.
    pub fn untagged_max_age(&self) -> Duration {
        Duration::days(i64::from(self.untagged_max_age_days))
    }

    /// The cap with `None` mapped to effectively-infinite, for ordering
    /// comparisons.
    fn effective_cap(&self) -> u64 {
        self.tagged_keep_count.map_or(u64::MAX, u64::from)
    }
}

/// The full per-tier policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Dev tier rules
    pub dev: RetentionPolicy,
    /// Staging tier rules
    pub staging: RetentionPolicy,
    /// Production tier rules
    pub production: RetentionPolicy,
}

/// Errors loading or validating a policy table.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(
        "policy ordering violated: {tier} {field} ({value}) exceeds {stricter_tier}'s ({stricter_value})"
    )]
    OrderingViolation {
        tier: Tier,
        stricter_tier: Tier,
        field: &'static str,
        value: String,
        stricter_value: String,
    },
}

impl PolicyTable {
    /// Built-in defaults: dev 3d/10, staging 14d/20, production 30d/unlimited.
    pub fn builtin() -> Self {
        Self {
            dev: RetentionPolicy {
                untagged_max_age_days: 3,
                tagged_keep_count: Some(10),
            },
            staging: RetentionPolicy {
                untagged_max_age_days: 14,
                tagged_keep_count: Some(20),
            },
            production: RetentionPolicy {
                untagged_max_age_days: 30,
                tagged_keep_count: None,
            },
        }
    }

    /// Load and validate a policy table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: PolicyTable = toml::from_str(&text)?;
        table.validate()?;
        Ok(table)
    }

    /// The policy for one tier.
    pub fn get(&self, tier: Tier) -> &RetentionPolicy {
        match tier {
            Tier::Dev => &self.dev,
            Tier::Staging => &self.staging,
            Tier::Production => &self.production,
        }
    }

    /// Enforce the conservatism ordering on both thresholds:
    /// production ≥ staging ≥ dev.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let pairs = [
            (Tier::Dev, Tier::Staging),
            (Tier::Staging, Tier::Production),
        ];

        for (looser, stricter) in pairs {
            let looser_policy = self.get(looser);
            let stricter_policy = self.get(stricter);

            if looser_policy.untagged_max_age_days > stricter_policy.untagged_max_age_days {
                return Err(PolicyError::OrderingViolation {
                    tier: looser,
                    stricter_tier: stricter,
                    field: "untagged_max_age_days",
                    value: looser_policy.untagged_max_age_days.to_string(),
                    stricter_value: stricter_policy.untagged_max_age_days.to_string(),
                });
            }

            if looser_policy.effective_cap() > stricter_policy.effective_cap() {
                return Err(PolicyError::OrderingViolation {
                    tier: looser,
                    stricter_tier: stricter,
                    field: "tagged_keep_count",
                    value: cap_display(looser_policy.tagged_keep_count),
                    stricter_value: cap_display(stricter_policy.tagged_keep_count),
                });
            }
        }

        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the compact JSON snapshot, recorded in run reports so a
    /// report can be tied back to the exact policy that produced it.
    pub fn sha256(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

fn cap_display(cap: Option<u32>) -> String {
    match cap {
        Some(n) => n.to_string(),
        None => "unlimited".to_string(),
    }
}
