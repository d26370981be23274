//! Failure isolation: repository- and artifact-scoped errors never take
//! down the rest of the run.

use chrono::{Duration, Utc};
use regsweep::{Mode, PolicyTable, RunError, SweepOptions, SweepRunner};
use regsweep_registry::{ImageDescriptor, MockOp, MockRegistry, RegistryError};

fn add_untagged(registry: &MockRegistry, repo: &str, digest: &str, age_days: i64) {
    registry.add_image(
        repo,
        ImageDescriptor::new(digest, vec![], Utc::now() - Duration::days(age_days)),
        2048,
    );
}

fn run(registry: &MockRegistry) -> regsweep::RunReport {
    let policy = PolicyTable::builtin();
    let options = SweepOptions {
        mode: Mode::Execute,
        concurrency: 2,
        verbose: false,
        repo_filter: None,
    };
    SweepRunner::new(registry, &policy, options)
        .run()
        .unwrap()
}

#[test]
fn listing_failure_skips_one_repo_and_continues() {
    let registry = MockRegistry::new();
    add_untagged(&registry, "a-dev", "sha256:a1", 10);
    add_untagged(&registry, "b-dev", "sha256:b1", 10);
    add_untagged(&registry, "c-dev", "sha256:c1", 10);
    registry.inject_failure(
        MockOp::ListImages,
        Some("b-dev"),
        RegistryError::Transient("tag listing timed out".to_string()),
    );

    let report = run(&registry);

    assert_eq!(report.repositories.len(), 3);
    assert_eq!(report.repositories_swept, 2);
    assert_eq!(report.repositories_skipped, 1);

    let skipped = report
        .repositories
        .iter()
        .find(|o| o.repository == "b-dev")
        .unwrap();
    assert!(skipped.skipped);
    assert!(skipped.errors[0].contains("TRANSIENT"));

    // a-dev and c-dev still swept their expired images
    let deleted: Vec<String> = registry.deleted().into_iter().map(|(r, _)| r).collect();
    assert!(deleted.contains(&"a-dev".to_string()));
    assert!(deleted.contains(&"c-dev".to_string()));
    assert_eq!(report.total_deleted, 2);
}

#[test]
fn delete_failure_isolated_to_one_artifact() {
    let registry = MockRegistry::new();
    for i in 0..4 {
        add_untagged(&registry, "app-dev", &format!("sha256:u{i}"), 10);
    }
    registry.inject_failure_count(
        MockOp::DeleteImage,
        Some("app-dev"),
        RegistryError::Transient("storage backend busy".to_string()),
        1,
    );

    let report = run(&registry);

    assert_eq!(report.total_deleted, 3);
    assert_eq!(report.total_failed, 1);
    assert_eq!(registry.deleted().len(), 3);

    let outcome = &report.repositories[0];
    assert!(!outcome.skipped);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("storage backend busy"));
}

#[test]
fn total_unavailability_is_fatal_before_any_report() {
    let registry = MockRegistry::new();
    add_untagged(&registry, "a-dev", "sha256:a1", 10);
    registry.inject_failure(
        MockOp::ListRepositories,
        None,
        RegistryError::Unreachable("dns resolution failed".to_string()),
    );

    let policy = PolicyTable::builtin();
    let result = SweepRunner::new(&registry, &policy, SweepOptions::default()).run();

    assert!(matches!(result, Err(RunError::RegistryUnavailable(_))));
    assert!(registry.deleted().is_empty());
}

#[test]
fn scan_outage_degrades_without_exemptions() {
    let registry = MockRegistry::new();
    add_untagged(&registry, "app-dev", "sha256:old", 30);
    registry.inject_failure(
        MockOp::ScanResults,
        Some("app-dev"),
        RegistryError::Scan {
            repo: "app-dev".to_string(),
            message: "scanner maintenance window".to_string(),
        },
    );

    let report = run(&registry);

    // No findings reachable: nothing is exempt, the expired image deletes,
    // and the outage is recorded for the audit trail
    assert_eq!(report.total_deleted, 1);
    assert_eq!(report.vulnerable_artifacts, 0);
    assert_eq!(report.error_count(), 1);
}
