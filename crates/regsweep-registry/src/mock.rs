//! In-memory mock registry.
//!
//! Backs the test suite and fixture-driven CLI runs. Supports per-operation
//! failure injection so error paths (repository-scoped skips, artifact-scoped
//! delete failures, total unavailability) can be exercised deterministically.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::Registry;
use crate::error::RegistryError;
use crate::types::{DeleteOutcome, ImageDescriptor, ScanFinding, Severity};

/// Operations that can have failures injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListRepositories,
    ListImages,
    ImageSize,
    ScanResults,
    DeleteImage,
}

/// A scripted failure for one operation.
#[derive(Debug, Clone)]
struct FailureConfig {
    /// Error to return
    error: RegistryError,
    /// Restrict the failure to one repository (None = all)
    repo: Option<String>,
    /// Number of times to fail before succeeding (None = always fail)
    fail_count: Option<u32>,
}

#[derive(Debug, Default)]
struct RepoState {
    images: Vec<ImageDescriptor>,
    sizes: HashMap<String, u64>,
    findings: Vec<ScanFinding>,
}

#[derive(Debug, Default)]
struct MockState {
    repos: BTreeMap<String, RepoState>,
    failures: HashMap<MockOp, FailureConfig>,
    call_counts: HashMap<MockOp, u32>,
    deleted: Vec<(String, String)>,
}

/// In-memory registry with failure injection.
///
/// Interior mutability keeps the `Registry` methods on `&self`, matching how
/// the engine shares one registry handle across deletion workers.
#[derive(Debug, Default)]
pub struct MockRegistry {
    state: Mutex<MockState>,
}

impl MockRegistry {
    /// Create an empty mock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty repository.
    pub fn add_repo(&self, name: &str) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.repos.entry(name.to_string()).or_default();
    }

    /// Add an image to a repository, creating the repository if needed.
    pub fn add_image(&self, repo: &str, descriptor: ImageDescriptor, size_bytes: u64) {
        let mut state = self.state.lock().expect("mock state poisoned");
        let repo_state = state.repos.entry(repo.to_string()).or_default();
        repo_state
            .sizes
            .insert(descriptor.digest.clone(), size_bytes);
        repo_state.images.push(descriptor);
    }

    /// Record a scan finding for a digest in a repository.
    pub fn add_finding(&self, repo: &str, digest: &str, severity: Severity) {
        let mut state = self.state.lock().expect("mock state poisoned");
        let repo_state = state.repos.entry(repo.to_string()).or_default();
        repo_state.findings.push(ScanFinding {
            digest: digest.to_string(),
            severity,
        });
    }

    /// Inject a failure for an operation, optionally scoped to one repository.
    pub fn inject_failure(&self, op: MockOp, repo: Option<&str>, error: RegistryError) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.failures.insert(
            op,
            FailureConfig {
                error,
                repo: repo.map(str::to_string),
                fail_count: None,
            },
        );
        state.call_counts.insert(op, 0);
    }

    /// Inject a failure that clears after `count` failing calls.
    pub fn inject_failure_count(
        &self,
        op: MockOp,
        repo: Option<&str>,
        error: RegistryError,
        count: u32,
    ) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.failures.insert(
            op,
            FailureConfig {
                error,
                repo: repo.map(str::to_string),
                fail_count: Some(count),
            },
        );
        state.call_counts.insert(op, 0);
    }

    /// Digests deleted so far, as (repository, digest) pairs in call order.
    pub fn deleted(&self) -> Vec<(String, String)> {
        let state = self.state.lock().expect("mock state poisoned");
        state.deleted.clone()
    }

    /// Load a fixture file describing repositories, images, and findings.
    pub fn from_fixture_file(path: &Path) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path)?;
        let fixture: Fixture = serde_json::from_str(&json)?;
        Ok(Self::from_fixture(fixture))
    }

    fn from_fixture(fixture: Fixture) -> Self {
        let registry = Self::new();
        for repo in fixture.repositories {
            registry.add_repo(&repo.name);
            for image in repo.images {
                let severity = image.severity;
                let descriptor =
                    ImageDescriptor::new(image.digest.clone(), image.tags, image.pushed_at);
                registry.add_image(&repo.name, descriptor, image.size_bytes);
                if severity != Severity::None {
                    registry.add_finding(&repo.name, &image.digest, severity);
                }
            }
        }
        registry
    }

    /// Check the injected failure table for `op` against `repo`, counting
    /// the call and clearing the config once its fail_count is exhausted.
    fn check_failure(state: &mut MockState, op: MockOp, repo: Option<&str>) -> Option<RegistryError> {
        let config = state.failures.get(&op)?;
        if let (Some(scope), Some(repo)) = (config.repo.as_deref(), repo) {
            if scope != repo {
                return None;
            }
        }
        let error = config.error.clone();
        let count = state.call_counts.entry(op).or_insert(0);
        *count += 1;
        if let Some(limit) = config.fail_count {
            if *count > limit {
                state.failures.remove(&op);
                return None;
            }
        }
        Some(error)
    }
}

impl Registry for MockRegistry {
    fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if let Some(err) = Self::check_failure(&mut state, MockOp::ListRepositories, None) {
            return Err(err);
        }
        Ok(state.repos.keys().cloned().collect())
    }

    fn list_images(&self, repo: &str) -> Result<Vec<ImageDescriptor>, RegistryError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if let Some(err) = Self::check_failure(&mut state, MockOp::ListImages, Some(repo)) {
            return Err(err);
        }
        match state.repos.get(repo) {
            Some(repo_state) => Ok(repo_state.images.clone()),
            None => Err(RegistryError::RepoNotFound(repo.to_string())),
        }
    }

    fn image_size(&self, repo: &str, digest: &str) -> Result<u64, RegistryError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if let Some(err) = Self::check_failure(&mut state, MockOp::ImageSize, Some(repo)) {
            return Err(err);
        }
        let repo_state = state
            .repos
            .get(repo)
            .ok_or_else(|| RegistryError::RepoNotFound(repo.to_string()))?;
        repo_state.sizes.get(digest).copied().ok_or_else(|| {
            RegistryError::Transient(format!("no size recorded for {digest} in {repo}"))
        })
    }

    fn scan_results(&self, repo: &str) -> Result<Vec<ScanFinding>, RegistryError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if let Some(err) = Self::check_failure(&mut state, MockOp::ScanResults, Some(repo)) {
            return Err(err);
        }
        match state.repos.get(repo) {
            Some(repo_state) => Ok(repo_state.findings.clone()),
            None => Err(RegistryError::RepoNotFound(repo.to_string())),
        }
    }

    fn delete_image(&self, repo: &str, digest: &str) -> Result<DeleteOutcome, RegistryError> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if let Some(err) = Self::check_failure(&mut state, MockOp::DeleteImage, Some(repo)) {
            return Err(err);
        }
        let repo_state = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| RegistryError::RepoNotFound(repo.to_string()))?;
        let before = repo_state.images.len();
        repo_state.images.retain(|image| image.digest != digest);
        if repo_state.images.len() == before {
            return Ok(DeleteOutcome::NotFound);
        }
        state.deleted.push((repo.to_string(), digest.to_string()));
        Ok(DeleteOutcome::Deleted)
    }
}

/// Errors loading a registry fixture file.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fixture file schema: a registry snapshot as JSON.
#[derive(Debug, Serialize, Deserialize)]
struct Fixture {
    repositories: Vec<FixtureRepo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FixtureRepo {
    name: String,
    #[serde(default)]
    images: Vec<FixtureImage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FixtureImage {
    digest: String,
    #[serde(default)]
    tags: Vec<String>,
    pushed_at: DateTime<Utc>,
    #[serde(default)]
    size_bytes: u64,
    #[serde(default)]
    severity: Severity,
}
