//! Artifact registry interface for regsweep.
//!
//! This crate defines the boundary between the retention engine and the
//! registry it sweeps: the wire types reported by the registry, the
//! `Registry` trait the engine consumes, the registry error taxonomy, and
//! an in-memory mock registry with failure injection for tests and
//! fixture-driven runs.

pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use client::Registry;
pub use error::{ErrorCode, RegistryError};
pub use mock::{FixtureError, MockOp, MockRegistry};
pub use types::{DeleteOutcome, ImageDescriptor, ScanFinding, Severity};
