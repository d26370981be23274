//! Inventory collector.
//!
//! Fetches the image list and per-image metadata for one repository.
//! Read-only: the collector never issues a mutating registry call. A
//! failed listing is a repository-scoped error, reported to the caller so
//! the repository can be skipped without aborting the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regsweep_registry::{ImageDescriptor, Registry, RegistryError, Severity};

/// One image with everything the decision engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Content digest (identity within the repository)
    pub digest: String,

    /// Tags currently pointing at this digest
    pub tags: Vec<String>,

    /// When the image was pushed
    pub pushed_at: DateTime<Utc>,

    /// Image size in bytes (0 when the size lookup failed)
    pub size_bytes: u64,

    /// Worst scan severity; `None` until the annotator runs
    #[serde(default)]
    pub severity: Severity,
}

impl Artifact {
    /// True when no tag points at this digest.
    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }

    fn from_descriptor(descriptor: ImageDescriptor, size_bytes: u64) -> Self {
        Self {
            digest: descriptor.digest,
            tags: descriptor.tags,
            pushed_at: descriptor.pushed_at,
            size_bytes,
            severity: Severity::None,
        }
    }
}

/// Collected inventory for one repository.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// The artifacts, in registry-reported order (the decision engine
    /// re-sorts by push time itself)
    pub artifacts: Vec<Artifact>,

    /// Non-fatal warnings (per-image size lookups that failed)
    pub warnings: Vec<String>,
}

/// Collect the inventory for one repository.
///
/// A listing failure is returned as `Err` and the repository is skipped
/// for the run. A per-image size failure only degrades the reclaimed-bytes
/// estimate: the artifact is kept with size 0 and a warning is recorded.
pub fn collect(registry: &dyn Registry, repo: &str) -> Result<Inventory, RegistryError> {
    let descriptors = registry.list_images(repo)?;

    let mut inventory = Inventory::default();
    for descriptor in descriptors {
        let size_bytes = match registry.image_size(repo, &descriptor.digest) {
            Ok(size) => size,
            Err(err) => {
                inventory.warnings.push(format!(
                    "size lookup failed for {}: {} ({})",
                    descriptor.digest,
                    err,
                    err.code().as_str()
                ));
                0
            }
        };
        inventory
            .artifacts
            .push(Artifact::from_descriptor(descriptor, size_bytes));
    }

    Ok(inventory)
}
