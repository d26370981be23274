//! Execution controller.
//!
//! Applies the decision list for one repository. Dry-run and execution
//! share a single path parameterized by a delete port (no-op vs real), so
//! the digests a dry run reports are exactly the digests an execution run
//! would attempt. Deletions fan out over a bounded pool of worker threads
//! feeding results back to the aggregating owner over a channel; a failed
//! deletion is recorded and the rest proceed, with no retry.

use std::sync::mpsc;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use regsweep_registry::{DeleteOutcome, Registry, RegistryError};

/// Default deletion worker count, sized for registry rate limits.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Decisions are counted as if applied; no registry mutation calls
    DryRun,
    /// Delete decisions are issued against the registry
    Execute,
}

impl Mode {
    /// Human-readable form for log lines and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::DryRun => "dry-run",
            Mode::Execute => "execute",
        }
    }
}

/// The deletion side-effect port.
///
/// Dry-run installs the no-op port; execution installs the registry-backed
/// one. Everything else in the path is identical.
trait DeletePort: Sync {
    fn delete(&self, repo: &str, digest: &str) -> Result<DeleteOutcome, RegistryError>;
}

struct NoopPort;

impl DeletePort for NoopPort {
    fn delete(&self, _repo: &str, _digest: &str) -> Result<DeleteOutcome, RegistryError> {
        Ok(DeleteOutcome::Deleted)
    }
}

struct RegistryPort<'a> {
    registry: &'a dyn Registry,
}

impl DeletePort for RegistryPort<'_> {
    fn delete(&self, repo: &str, digest: &str) -> Result<DeleteOutcome, RegistryError> {
        self.registry.delete_image(repo, digest)
    }
}

/// Outcome of applying the decision list for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Artifacts deleted (or counted as deleted in dry-run)
    pub deleted: usize,

    /// Artifacts kept
    pub kept: usize,

    /// Deletions that failed
    pub failed: usize,

    /// Estimated bytes reclaimed (sum of sizes over successful deletes)
    pub bytes_reclaimed: u64,

    /// Per-artifact deletion errors
    pub errors: Vec<String>,
}

/// Apply decisions for one repository.
///
/// `concurrency` is clamped to at least 1 and at most the number of
/// deletions to issue.
pub fn execute(
    registry: &dyn Registry,
    repo: &str,
    decisions: &[Decision],
    mode: Mode,
    concurrency: usize,
) -> ExecOutcome {
    match mode {
        Mode::DryRun => apply(repo, decisions, &NoopPort, concurrency),
        Mode::Execute => apply(repo, decisions, &RegistryPort { registry }, concurrency),
    }
}

fn apply(repo: &str, decisions: &[Decision], port: &dyn DeletePort, concurrency: usize) -> ExecOutcome {
    let mut outcome = ExecOutcome::default();
    let deletions: Vec<&Decision> = decisions.iter().filter(|d| d.is_delete()).collect();
    outcome.kept = decisions.len() - deletions.len();

    if deletions.is_empty() {
        return outcome;
    }

    let workers = concurrency.max(1).min(deletions.len());

    let (job_tx, job_rx) = mpsc::channel::<&Decision>();
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = mpsc::channel::<DeleteResult>();

    for decision in deletions.iter().copied() {
        job_tx.send(decision).expect("job channel open");
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = &job_rx;
            let result_tx = result_tx.clone();
            scope.spawn(move || loop {
                // Hold the receiver lock only for the dequeue, not the call
                let decision = {
                    let rx = job_rx.lock().expect("job receiver poisoned");
                    rx.recv()
                };
                let decision = match decision {
                    Ok(d) => d,
                    Err(_) => break, // queue drained
                };
                let result = match port.delete(repo, &decision.digest) {
                    // Idempotent by contract: an already-absent digest is
                    // success, not error
                    Ok(DeleteOutcome::Deleted) | Ok(DeleteOutcome::NotFound) => DeleteResult {
                        size_bytes: decision.size_bytes,
                        error: None,
                    },
                    Err(err) => DeleteResult {
                        size_bytes: decision.size_bytes,
                        error: Some(format!(
                            "delete failed for {}: {} ({})",
                            decision.digest,
                            err,
                            err.code().as_str()
                        )),
                    },
                };
                if result_tx.send(result).is_err() {
                    break;
                }
            });
        }
        drop(result_tx);

        // Single aggregating owner: workers never touch shared counters
        for result in result_rx {
            match result.error {
                None => {
                    outcome.deleted += 1;
                    outcome.bytes_reclaimed += result.size_bytes;
                }
                Some(error) => {
                    outcome.failed += 1;
                    outcome.errors.push(error);
                }
            }
        }
    });

    outcome
}

struct DeleteResult {
    size_bytes: u64,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, DecisionReason};
    use chrono::{TimeZone, Utc};
    use regsweep_registry::{ImageDescriptor, MockOp, MockRegistry};

    fn delete_decision(digest: &str, size: u64) -> Decision {
        Decision {
            digest: digest.to_string(),
            action: Action::Delete,
            reason: DecisionReason::UntaggedExpired,
            size_bytes: size,
        }
    }

    fn keep_decision(digest: &str) -> Decision {
        Decision {
            digest: digest.to_string(),
            action: Action::Keep,
            reason: DecisionReason::UnderCap,
            size_bytes: 10,
        }
    }

    fn registry_with(digests: &[&str]) -> MockRegistry {
        let registry = MockRegistry::new();
        for digest in digests {
            registry.add_image(
                "repo",
                ImageDescriptor::new(
                    *digest,
                    vec![],
                    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                ),
                100,
            );
        }
        registry
    }

    #[test]
    fn test_dry_run_issues_no_mutations() {
        let registry = registry_with(&["sha256:aa", "sha256:bb"]);
        let decisions = vec![
            delete_decision("sha256:aa", 100),
            delete_decision("sha256:bb", 200),
            keep_decision("sha256:cc"),
        ];

        let outcome = execute(&registry, "repo", &decisions, Mode::DryRun, 2);

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.kept, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.bytes_reclaimed, 300);
        assert!(registry.deleted().is_empty());
    }

    #[test]
    fn test_execute_deletes_marked_digests() {
        let registry = registry_with(&["sha256:aa", "sha256:bb", "sha256:cc"]);
        let decisions = vec![
            delete_decision("sha256:aa", 100),
            delete_decision("sha256:cc", 50),
            keep_decision("sha256:bb"),
        ];

        let outcome = execute(&registry, "repo", &decisions, Mode::Execute, 2);

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.bytes_reclaimed, 150);

        let mut deleted: Vec<String> =
            registry.deleted().into_iter().map(|(_, d)| d).collect();
        deleted.sort();
        assert_eq!(deleted, vec!["sha256:aa".to_string(), "sha256:cc".to_string()]);
    }

    #[test]
    fn test_absent_digest_counts_as_success() {
        let registry = registry_with(&[]);
        registry.add_repo("repo");
        let decisions = vec![delete_decision("sha256:gone", 100)];

        let outcome = execute(&registry, "repo", &decisions, Mode::Execute, 1);

        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.failed, 0);
    }

    #[test]
    fn test_failed_deletion_recorded_without_aborting_rest() {
        let registry = registry_with(&["sha256:aa", "sha256:bb", "sha256:cc"]);
        // First delete call fails, the rest succeed
        registry.inject_failure_count(
            MockOp::DeleteImage,
            Some("repo"),
            RegistryError::Transient("connection reset".to_string()),
            1,
        );
        let decisions = vec![
            delete_decision("sha256:aa", 100),
            delete_decision("sha256:bb", 100),
            delete_decision("sha256:cc", 100),
        ];

        // Single worker for a deterministic failure position
        let outcome = execute(&registry, "repo", &decisions, Mode::Execute, 1);

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.bytes_reclaimed, 200);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("TRANSIENT"));
    }

    #[test]
    fn test_no_deletions_short_circuits() {
        let registry = registry_with(&[]);
        registry.add_repo("repo");
        let decisions = vec![keep_decision("sha256:aa"), keep_decision("sha256:bb")];

        let outcome = execute(&registry, "repo", &decisions, Mode::Execute, 4);

        assert_eq!(outcome.kept, 2);
        assert_eq!(outcome.deleted, 0);
        assert!(registry.deleted().is_empty());
    }

    #[test]
    fn test_concurrency_clamped_to_workload() {
        let registry = registry_with(&["sha256:aa"]);
        let decisions = vec![delete_decision("sha256:aa", 100)];

        // More workers than deletions must not deadlock or misbehave
        let outcome = execute(&registry, "repo", &decisions, Mode::Execute, 64);
        assert_eq!(outcome.deleted, 1);
    }

    #[test]
    fn test_zero_concurrency_clamped_to_one() {
        let registry = registry_with(&["sha256:aa"]);
        let decisions = vec![delete_decision("sha256:aa", 100)];

        let outcome = execute(&registry, "repo", &decisions, Mode::Execute, 0);
        assert_eq!(outcome.deleted, 1);
    }

    #[test]
    fn test_dry_run_and_execute_agree_on_digest_set() {
        let decisions = vec![
            delete_decision("sha256:aa", 1),
            keep_decision("sha256:bb"),
            delete_decision("sha256:cc", 1),
        ];

        let dry_registry = registry_with(&["sha256:aa", "sha256:cc"]);
        let dry = execute(&dry_registry, "repo", &decisions, Mode::DryRun, 2);

        let exec_registry = registry_with(&["sha256:aa", "sha256:cc"]);
        let exec = execute(&exec_registry, "repo", &decisions, Mode::Execute, 2);

        assert_eq!(dry.deleted, exec.deleted);
        assert_eq!(dry.kept, exec.kept);
        assert_eq!(dry.bytes_reclaimed, exec.bytes_reclaimed);
    }
}
