//! Vulnerability annotator.
//!
//! Joins completed scan results onto a repository's artifacts. Scanning is
//! advisory: an artifact without a completed scan stays at severity `none`
//! and remains eligible for normal deletion rules, and a scan-service
//! failure degrades to all-`none` with the error recorded for the run
//! report rather than failing the repository.

use std::collections::HashMap;

use crate::inventory::Artifact;
use regsweep_registry::Registry;

/// Annotate artifacts with scan severities.
///
/// Returns the scan-service error message when results could not be
/// fetched; severities are left at `none` in that case.
pub fn annotate(registry: &dyn Registry, repo: &str, artifacts: &mut [Artifact]) -> Option<String> {
    let findings = match registry.scan_results(repo) {
        Ok(findings) => findings,
        Err(err) => {
            return Some(format!("scan results unavailable: {} ({})", err, err.code().as_str()));
        }
    };

    let by_digest: HashMap<&str, _> = findings
        .iter()
        .map(|finding| (finding.digest.as_str(), finding.severity))
        .collect();

    for artifact in artifacts.iter_mut() {
        if let Some(severity) = by_digest.get(artifact.digest.as_str()) {
            artifact.severity = *severity;
        }
    }

    None
}
