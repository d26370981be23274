//! Run orchestrator.
//!
//! Drives the per-repository pipeline: classify → collect → annotate →
//! decide → execute, then merges the per-repository outcomes into a single
//! run report. Repositories are independent: a repository-scoped failure
//! records an error and moves on, and only total registry unavailability
//! (the initial listing failing) aborts the run, before any report is
//! written.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use globset::GlobSet;
use ulid::Ulid;

use crate::classifier::classify;
use crate::decision::decide;
use crate::executor::{execute, Mode};
use crate::inventory;
use crate::policy::PolicyTable;
use crate::report::{RepoOutcome, RunReport};
use crate::signal::CancelFlag;
use crate::state::{PhaseError, RunPhase, RunTracker};
use crate::vuln;
use regsweep_registry::{Registry, RegistryError};

/// Fatal run errors. Everything non-fatal lands in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(RegistryError),

    #[error("failed to assemble run report: {0}")]
    Report(#[from] serde_json::Error),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// Options for one sweep run.
#[derive(Debug)]
pub struct SweepOptions {
    /// Dry-run or execute
    pub mode: Mode,

    /// Deletion worker count
    pub concurrency: usize,

    /// Per-repository progress on stderr
    pub verbose: bool,

    /// Repository include patterns (None = all)
    pub repo_filter: Option<GlobSet>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            mode: Mode::DryRun,
            concurrency: crate::executor::DEFAULT_CONCURRENCY,
            verbose: false,
            repo_filter: None,
        }
    }
}

/// One sweep over every repository in a registry.
pub struct SweepRunner<'a> {
    registry: &'a dyn Registry,
    policy: &'a PolicyTable,
    options: SweepOptions,
    cancel: Option<Arc<CancelFlag>>,
}

impl<'a> SweepRunner<'a> {
    /// Create a runner.
    pub fn new(registry: &'a dyn Registry, policy: &'a PolicyTable, options: SweepOptions) -> Self {
        Self {
            registry,
            policy,
            options,
            cancel: None,
        }
    }

    /// Attach a cancellation flag, checked between repositories.
    pub fn with_cancel_flag(mut self, flag: Arc<CancelFlag>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run the sweep and return the (not yet persisted) report.
    pub fn run(&self) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let run_id = Ulid::new().to_string();
        let mut tracker = RunTracker::new();

        let mut repositories = self
            .registry
            .list_repositories()
            .map_err(RunError::RegistryUnavailable)?;
        repositories.sort();

        if let Some(filter) = &self.options.repo_filter {
            repositories.retain(|name| filter.is_match(name));
        }

        self.log(&format!(
            "run {run_id}: {} repositor{} to sweep ({})",
            repositories.len(),
            if repositories.len() == 1 { "y" } else { "ies" },
            self.options.mode.as_str(),
        ));

        let mut outcomes = Vec::with_capacity(repositories.len());
        let mut cancelled = false;

        for repository in &repositories {
            // Cooperative checkpoint: never interrupt a repository mid-flight
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            tracker.start_repository(repository)?;
            outcomes.push(self.sweep_repository(&mut tracker, repository)?);
        }

        tracker.transition(RunPhase::Reporting)?;
        let report = RunReport::from_outcomes(
            run_id,
            self.options.mode,
            cancelled,
            self.policy,
            outcomes,
            started.elapsed().as_millis() as u64,
        )?;
        tracker.transition(RunPhase::Done)?;

        self.log(&report.human_summary);
        Ok(report)
    }

    /// The classify → collect → annotate → decide → execute pipeline for
    /// one repository. Never fails the run: errors land in the outcome.
    fn sweep_repository(
        &self,
        tracker: &mut RunTracker,
        repository: &str,
    ) -> Result<RepoOutcome, RunError> {
        let tier = classify(repository);

        let collected = match inventory::collect(self.registry, repository) {
            Ok(collected) => collected,
            Err(err) => {
                self.log(&format!("{repository}: skipped ({err})"));
                return Ok(RepoOutcome::skipped(
                    repository,
                    tier,
                    format!("{} ({})", err, err.code().as_str()),
                ));
            }
        };

        tracker.transition(RunPhase::Deciding)?;

        let mut outcome = RepoOutcome::new(repository, tier);
        outcome.errors.extend(collected.warnings);

        let mut artifacts = collected.artifacts;
        if let Some(scan_error) = vuln::annotate(self.registry, repository, &mut artifacts) {
            outcome.errors.push(scan_error);
        }

        outcome.scanned = artifacts.len();
        outcome.vulnerable = artifacts.iter().filter(|a| a.severity.is_exempt()).count();

        let decisions = decide(&artifacts, self.policy.get(tier), Utc::now());

        tracker.transition(RunPhase::Executing)?;

        let exec = execute(
            self.registry,
            repository,
            &decisions,
            self.options.mode,
            self.options.concurrency,
        );
        outcome.deleted = exec.deleted;
        outcome.kept = exec.kept;
        outcome.failed = exec.failed;
        outcome.bytes_reclaimed = exec.bytes_reclaimed;
        outcome.errors.extend(exec.errors);

        self.log(&format!(
            "{repository} [{tier}]: {} scanned, {} deleted, {} kept, {} failed",
            outcome.scanned, outcome.deleted, outcome.kept, outcome.failed
        ));

        Ok(outcome)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.is_cancelled())
            .unwrap_or(false)
    }

    fn log(&self, message: &str) {
        if self.options.verbose {
            eprintln!("[sweep] {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use regsweep_registry::{ImageDescriptor, MockOp, MockRegistry, Severity};

    fn add_untagged(registry: &MockRegistry, repo: &str, digest: &str, age_days: i64, size: u64) {
        registry.add_image(
            repo,
            ImageDescriptor::new(digest, vec![], Utc::now() - Duration::days(age_days)),
            size,
        );
    }

    fn options(mode: Mode) -> SweepOptions {
        SweepOptions {
            mode,
            concurrency: 2,
            verbose: false,
            repo_filter: None,
        }
    }

    #[test]
    fn test_sweep_applies_tier_policies() {
        let registry = MockRegistry::new();
        // 10-day-old untagged image: expired for dev (3d), kept for prod (30d)
        add_untagged(&registry, "app-dev", "sha256:dev-old", 10, 100);
        add_untagged(&registry, "app-prod", "sha256:prod-old", 10, 100);

        let policy = PolicyTable::builtin();
        let runner = SweepRunner::new(&registry, &policy, options(Mode::Execute));
        let report = runner.run().unwrap();

        assert_eq!(report.total_deleted, 1);
        assert_eq!(registry.deleted(), vec![(
            "app-dev".to_string(),
            "sha256:dev-old".to_string()
        )]);
    }

    #[test]
    fn test_fatal_when_listing_unavailable() {
        let registry = MockRegistry::new();
        registry.inject_failure(
            MockOp::ListRepositories,
            None,
            RegistryError::Unreachable("connection refused".to_string()),
        );

        let policy = PolicyTable::builtin();
        let runner = SweepRunner::new(&registry, &policy, options(Mode::DryRun));
        assert!(matches!(
            runner.run(),
            Err(RunError::RegistryUnavailable(_))
        ));
    }

    #[test]
    fn test_vulnerable_images_counted_not_deleted() {
        let registry = MockRegistry::new();
        add_untagged(&registry, "app-dev", "sha256:vuln", 100, 100);
        registry.add_finding("app-dev", "sha256:vuln", Severity::Critical);

        let policy = PolicyTable::builtin();
        let runner = SweepRunner::new(&registry, &policy, options(Mode::Execute));
        let report = runner.run().unwrap();

        assert_eq!(report.total_deleted, 0);
        assert_eq!(report.vulnerable_artifacts, 1);
        assert!(registry.deleted().is_empty());
    }

    #[test]
    fn test_repo_filter_restricts_run() {
        let registry = MockRegistry::new();
        add_untagged(&registry, "team-a-dev", "sha256:aa", 10, 100);
        add_untagged(&registry, "team-b-dev", "sha256:bb", 10, 100);

        let mut opts = options(Mode::Execute);
        let mut builder = globset::GlobSetBuilder::new();
        builder.add(globset::Glob::new("team-a-*").unwrap());
        opts.repo_filter = Some(builder.build().unwrap());

        let policy = PolicyTable::builtin();
        let report = SweepRunner::new(&registry, &policy, opts).run().unwrap();

        assert_eq!(report.repositories.len(), 1);
        assert_eq!(report.repositories[0].repository, "team-a-dev");
    }

    #[test]
    fn test_pre_cancelled_run_reports_empty() {
        let registry = MockRegistry::new();
        add_untagged(&registry, "app-dev", "sha256:aa", 10, 100);

        let flag = Arc::new(CancelFlag::new());
        flag.cancel();

        let policy = PolicyTable::builtin();
        let report = SweepRunner::new(&registry, &policy, options(Mode::Execute))
            .with_cancel_flag(flag)
            .run()
            .unwrap();

        assert!(report.cancelled);
        assert!(report.repositories.is_empty());
        assert!(registry.deleted().is_empty());
    }

    #[test]
    fn test_scan_failure_recorded_but_sweep_continues() {
        let registry = MockRegistry::new();
        add_untagged(&registry, "app-dev", "sha256:old", 10, 100);
        registry.inject_failure(
            MockOp::ScanResults,
            Some("app-dev"),
            RegistryError::Scan {
                repo: "app-dev".to_string(),
                message: "scanner offline".to_string(),
            },
        );

        let policy = PolicyTable::builtin();
        let report = SweepRunner::new(&registry, &policy, options(Mode::Execute))
            .run()
            .unwrap();

        // Annotation degraded to none; the expired image still deletes
        assert_eq!(report.total_deleted, 1);
        assert_eq!(report.error_count(), 1);
        assert!(report.repositories[0].errors[0].contains("SCAN_UNAVAILABLE"));
    }
}
