//! Retention decision engine.
//!
//! A pure function from a repository's annotated artifacts and its tier
//! policy to a keep/delete decision per artifact. No side effects, and
//! deterministic for identical inputs (`now` is an explicit parameter),
//! which is what makes dry-run output trustworthy as a preview of an
//! execution run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::Artifact;
use crate::policy::RetentionPolicy;

/// What to do with one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Keep,
    Delete,
}

/// Machine-readable reason for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// High or critical scan severity: never deleted automatically
    VulnerabilityExempt,
    /// Untagged and older than the tier's untagged-age threshold
    UntaggedExpired,
    /// Untagged but still inside the retention window
    WithinRetention,
    /// Tagged and inside the tier's keep cap
    UnderCap,
    /// Tagged and pushed out of the keep cap by newer images
    OverCap,
}

impl DecisionReason {
    /// Stable SCREAMING_SNAKE_CASE form for log lines.
    pub fn to_machine_string(&self) -> &'static str {
        match self {
            DecisionReason::VulnerabilityExempt => "VULNERABILITY_EXEMPT",
            DecisionReason::UntaggedExpired => "UNTAGGED_EXPIRED",
            DecisionReason::WithinRetention => "WITHIN_RETENTION",
            DecisionReason::UnderCap => "UNDER_CAP",
            DecisionReason::OverCap => "OVER_CAP",
        }
    }
}

/// The decision for one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Digest the decision applies to
    pub digest: String,

    /// Keep or delete
    pub action: Action,

    /// Why
    pub reason: DecisionReason,

    /// Size carried through so the executor can estimate reclaimed bytes
    /// without another registry call
    pub size_bytes: u64,
}

impl Decision {
    fn new(artifact: &Artifact, action: Action, reason: DecisionReason) -> Self {
        Self {
            digest: artifact.digest.clone(),
            action,
            reason,
            size_bytes: artifact.size_bytes,
        }
    }

    /// True when this decision marks the artifact for deletion.
    pub fn is_delete(&self) -> bool {
        self.action == Action::Delete
    }
}

/// Decide keep/delete for every artifact in a repository.
///
/// Untagged artifacts delete once older than the tier's age threshold.
/// Tagged artifacts delete oldest-first once the tier's keep cap is
/// exceeded, and only `count - cap` of them. High/critical severities are
/// exempt everywhere: an exempt candidate keeps its slot rather than
/// widening the deletion window, so the cap is a best-effort ceiling when
/// exemptions apply.
pub fn decide(
    artifacts: &[Artifact],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<Decision> {
    let mut decisions = Vec::with_capacity(artifacts.len());

    let (untagged, tagged): (Vec<&Artifact>, Vec<&Artifact>) =
        artifacts.iter().partition(|a| a.is_untagged());

    for artifact in untagged {
        let decision = if artifact.severity.is_exempt() {
            Decision::new(artifact, Action::Keep, DecisionReason::VulnerabilityExempt)
        } else if now.signed_duration_since(artifact.pushed_at) > policy.untagged_max_age() {
            Decision::new(artifact, Action::Delete, DecisionReason::UntaggedExpired)
        } else {
            Decision::new(artifact, Action::Keep, DecisionReason::WithinRetention)
        };
        decisions.push(decision);
    }

    decisions.extend(decide_tagged(tagged, policy));
    decisions
}

fn decide_tagged(mut tagged: Vec<&Artifact>, policy: &RetentionPolicy) -> Vec<Decision> {
    // Oldest first; digest tie-break keeps the order deterministic when
    // push times collide.
    tagged.sort_by(|a, b| {
        a.pushed_at
            .cmp(&b.pushed_at)
            .then_with(|| a.digest.cmp(&b.digest))
    });

    let cap = match policy.tagged_keep_count {
        Some(cap) => cap as usize,
        None => return all_under_cap(tagged),
    };

    if tagged.len() <= cap {
        return all_under_cap(tagged);
    }

    let candidate_count = tagged.len() - cap;
    tagged
        .into_iter()
        .enumerate()
        .map(|(index, artifact)| {
            if index >= candidate_count {
                Decision::new(artifact, Action::Keep, DecisionReason::UnderCap)
            } else if artifact.severity.is_exempt() {
                Decision::new(artifact, Action::Keep, DecisionReason::VulnerabilityExempt)
            } else {
                Decision::new(artifact, Action::Delete, DecisionReason::OverCap)
            }
        })
        .collect()
}

fn all_under_cap(tagged: Vec<&Artifact>) -> Vec<Decision> {
    tagged
        .into_iter()
        .map(|artifact| Decision::new(artifact, Action::Keep, DecisionReason::UnderCap))
        .collect()
}
