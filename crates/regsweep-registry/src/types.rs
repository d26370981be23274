//! Wire types reported by the artifact registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One image as reported by the registry's list operation.
///
/// The digest is the identity: unique within a repository, stable across
/// tag changes. An image may carry zero tags (a build intermediate) or many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Content digest, e.g. "sha256:ab12..."
    pub digest: String,

    /// Tags currently pointing at this digest (may be empty)
    #[serde(default)]
    pub tags: Vec<String>,

    /// When the image was pushed
    pub pushed_at: DateTime<Utc>,
}

impl ImageDescriptor {
    /// Create a descriptor from its parts.
    pub fn new(digest: impl Into<String>, tags: Vec<String>, pushed_at: DateTime<Utc>) -> Self {
        Self {
            digest: digest.into(),
            tags,
            pushed_at,
        }
    }

    /// True when no tag points at this digest.
    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Vulnerability severity reported by the registry's scanner.
///
/// `None` covers both a clean scan and an absent scan: scanning is
/// advisory, so unknown is treated the same as clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No findings, or no completed scan
    #[default]
    None,
    /// Low-severity findings only
    Low,
    /// Medium-severity findings
    Medium,
    /// High-severity findings
    High,
    /// Critical findings
    Critical,
}

impl Severity {
    /// True for severities that exempt an image from automated deletion.
    pub fn is_exempt(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One scan result row for a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// Digest the finding applies to
    pub digest: String,

    /// Worst severity found for that digest
    pub severity: Severity,
}

/// Result of a delete call.
///
/// Deletion is idempotent by contract: deleting an already-absent digest
/// reports `NotFound`, which callers treat as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The image existed and was deleted
    Deleted,
    /// The digest was already absent
    NotFound,
}
