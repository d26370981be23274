//! A full run against a policy file, persisted and reloaded as the audit
//! record.

use std::io::Write;

use chrono::{Duration, Utc};
use regsweep::{Mode, PolicyTable, RunReport, SweepOptions, SweepRunner};
use regsweep_registry::{ImageDescriptor, MockRegistry};

const POLICY_TOML: &str = r#"
[dev]
untagged_max_age_days = 1
tagged_keep_count = 2

[staging]
untagged_max_age_days = 7
tagged_keep_count = 5

[production]
untagged_max_age_days = 30
"#;

fn write_policy(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("retention.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{POLICY_TOML}").unwrap();
    path
}

#[test]
fn run_report_survives_persistence_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let policy = PolicyTable::from_file(&write_policy(&dir)).unwrap();

    let registry = MockRegistry::new();
    // 5 tagged under the file's dev cap of 2: the 3 oldest go
    for i in 0..5 {
        registry.add_image(
            "app-dev",
            ImageDescriptor::new(
                format!("sha256:t{i}"),
                vec!["v".to_string()],
                Utc::now() - Duration::days(i),
            ),
            1000,
        );
    }

    let options = SweepOptions {
        mode: Mode::Execute,
        concurrency: 2,
        verbose: false,
        repo_filter: None,
    };
    let report = SweepRunner::new(&registry, &policy, options)
        .run()
        .unwrap();

    assert_eq!(report.total_deleted, 3);
    assert_eq!(report.total_bytes_reclaimed, 3000);
    assert_eq!(report.policy_sha256, policy.sha256().unwrap());

    let report_dir = dir.path().join("reports");
    let path = report.write_to_dir(&report_dir).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("run_report.{}.json", report.run_id)
    );

    let loaded = RunReport::from_file(&path).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.mode, Mode::Execute);
    assert_eq!(loaded.total_deleted, 3);
    assert_eq!(loaded.policy, policy);
    assert_eq!(loaded.policy_sha256, report.policy_sha256);
    assert_eq!(loaded.repositories.len(), 1);
    assert_eq!(loaded.repositories[0].repository, "app-dev");
}
