//! The registry trait consumed by the retention engine.

use crate::error::RegistryError;
use crate::types::{DeleteOutcome, ImageDescriptor, ScanFinding};

/// Operations the retention engine needs from an artifact registry.
///
/// Implementations are expected to carry their own call timeouts; a timeout
/// surfaces as `RegistryError::Transient`, never as an indefinite hang.
/// `Sync` is required because deletion fans out over a bounded worker pool
/// that shares one registry handle.
pub trait Registry: Send + Sync {
    /// List all repository names.
    fn list_repositories(&self) -> Result<Vec<String>, RegistryError>;

    /// List images in a repository with digest, tags, and push time.
    fn list_images(&self, repo: &str) -> Result<Vec<ImageDescriptor>, RegistryError>;

    /// Size in bytes of one image.
    fn image_size(&self, repo: &str, digest: &str) -> Result<u64, RegistryError>;

    /// Completed scan results for a repository. Digests without a completed
    /// scan are simply absent from the result.
    fn scan_results(&self, repo: &str) -> Result<Vec<ScanFinding>, RegistryError>;

    /// Delete one image by digest. Deleting an absent digest reports
    /// `DeleteOutcome::NotFound`, which callers treat as success.
    fn delete_image(&self, repo: &str, digest: &str) -> Result<DeleteOutcome, RegistryError>;
}
