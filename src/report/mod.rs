//! Run report generation and persistence.
//!
//! The run report is the audit record: one timestamped JSON artifact per
//! sweep, carrying the policy snapshot (and its hash), per-repository
//! outcomes, totals, and every non-fatal error encountered. Reports are
//! written atomically (write-then-rename) so a crash never leaves a
//! half-written record behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::Tier;
use crate::executor::Mode;
use crate::policy::PolicyTable;

/// Schema version for run_report.json
pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_report.json
pub const RUN_REPORT_SCHEMA_ID: &str = "regsweep/run_report@1";

/// Per-repository outcome, merged into the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoOutcome {
    /// Repository name
    pub repository: String,

    /// Tier derived for this run
    pub tier: Tier,

    /// True when the repository was skipped (listing failed)
    pub skipped: bool,

    /// Artifacts enumerated
    pub scanned: usize,

    /// Artifacts kept
    pub kept: usize,

    /// Artifacts deleted (or counted as deleted in dry-run)
    pub deleted: usize,

    /// Deletions that failed
    pub failed: usize,

    /// Estimated bytes reclaimed
    pub bytes_reclaimed: u64,

    /// Artifacts carrying an exempting (high/critical) severity
    pub vulnerable: usize,

    /// Repository-scoped and artifact-scoped errors
    pub errors: Vec<String>,
}

impl RepoOutcome {
    /// An outcome with zero counts for a repository that is about to run.
    pub fn new(repository: impl Into<String>, tier: Tier) -> Self {
        Self {
            repository: repository.into(),
            tier,
            skipped: false,
            scanned: 0,
            kept: 0,
            deleted: 0,
            failed: 0,
            bytes_reclaimed: 0,
            vulnerable: 0,
            errors: vec![],
        }
    }

    /// An outcome for a repository skipped because its listing failed.
    pub fn skipped(repository: impl Into<String>, tier: Tier, error: String) -> Self {
        let mut outcome = Self::new(repository, tier);
        outcome.skipped = true;
        outcome.errors.push(error);
        outcome
    }
}

/// The persisted audit record for one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier (ulid)
    pub run_id: String,

    /// When the report was created
    pub created_at: DateTime<Utc>,

    /// Run mode
    pub mode: Mode,

    /// Whether the run was cancelled between repositories
    pub cancelled: bool,

    /// The policy table the run evaluated against
    pub policy: PolicyTable,

    /// SHA-256 of the policy's canonical JSON snapshot
    pub policy_sha256: String,

    /// Per-repository outcomes, in processing order
    pub repositories: Vec<RepoOutcome>,

    /// Repositories processed to completion
    pub repositories_swept: usize,

    /// Repositories skipped by per-repository errors
    pub repositories_skipped: usize,

    /// Total artifacts deleted across the run
    pub total_deleted: usize,

    /// Total artifacts kept across the run
    pub total_kept: usize,

    /// Total deletions that failed
    pub total_failed: usize,

    /// Total estimated bytes reclaimed
    pub total_bytes_reclaimed: u64,

    /// Artifacts flagged high/critical, left for human follow-up
    pub vulnerable_artifacts: usize,

    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,
}

impl RunReport {
    /// Aggregate per-repository outcomes into a report.
    pub fn from_outcomes(
        run_id: String,
        mode: Mode,
        cancelled: bool,
        policy: &PolicyTable,
        outcomes: Vec<RepoOutcome>,
        duration_ms: u64,
    ) -> Result<Self, serde_json::Error> {
        let policy_sha256 = policy.sha256()?;

        let repositories_skipped = outcomes.iter().filter(|o| o.skipped).count();
        let repositories_swept = outcomes.len() - repositories_skipped;
        let total_deleted = outcomes.iter().map(|o| o.deleted).sum();
        let total_kept = outcomes.iter().map(|o| o.kept).sum();
        let total_failed = outcomes.iter().map(|o| o.failed).sum();
        let total_bytes_reclaimed = outcomes.iter().map(|o| o.bytes_reclaimed).sum();
        let vulnerable_artifacts = outcomes.iter().map(|o| o.vulnerable).sum();

        let human_summary = Self::generate_human_summary(
            mode,
            cancelled,
            repositories_swept,
            repositories_skipped,
            total_deleted,
            total_failed,
            total_bytes_reclaimed,
            vulnerable_artifacts,
        );

        Ok(Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            schema_id: RUN_REPORT_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            mode,
            cancelled,
            policy: policy.clone(),
            policy_sha256,
            repositories: outcomes,
            repositories_swept,
            repositories_skipped,
            total_deleted,
            total_kept,
            total_failed,
            total_bytes_reclaimed,
            vulnerable_artifacts,
            duration_ms,
            human_summary,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_human_summary(
        mode: Mode,
        cancelled: bool,
        swept: usize,
        skipped: usize,
        deleted: usize,
        failed: usize,
        bytes: u64,
        vulnerable: usize,
    ) -> String {
        let mut summary = format!(
            "{} swept {} repositor{} ({} skipped): {} image(s) reclaimed, ~{}",
            if mode == Mode::DryRun {
                "Dry-run"
            } else {
                "Sweep"
            },
            swept,
            if swept == 1 { "y" } else { "ies" },
            skipped,
            deleted,
            format_bytes(bytes),
        );
        if failed > 0 {
            summary.push_str(&format!(", {failed} deletion(s) failed"));
        }
        if vulnerable > 0 {
            summary.push_str(&format!(
                ", {vulnerable} vulnerable image(s) held for review"
            ));
        }
        if cancelled {
            summary.push_str(" [cancelled before completion]");
        }
        summary
    }

    /// Count of non-fatal errors recorded across all repositories.
    pub fn error_count(&self) -> usize {
        self.repositories.iter().map(|o| o.errors.len()).sum()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write atomically to a file (write-then-rename).
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {e}")))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Write to a directory as `run_report.<run_id>.json`, creating the
    /// directory if needed. Returns the path written.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("run_report.{}.json", self.run_id));
        self.write_to_file(&path)?;
        Ok(path)
    }

    /// Load from file.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {e}")))
    }
}

/// Render a byte count with a binary unit suffix.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
