//! regsweep - policy-driven retention for environment-tiered container
//! registries.
//!
//! Classifies repositories into dev/staging/production tiers, applies
//! per-tier retention rules to every image, and deletes (or, by default,
//! only reports) what falls outside policy, persisting an audit report
//! for every run.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod executor;
pub mod inventory;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod signal;
pub mod state;
pub mod vuln;

pub use classifier::{classify, Tier};
pub use decision::{decide, Action, Decision, DecisionReason};
pub use executor::Mode;
pub use pipeline::{RunError, SweepOptions, SweepRunner};
pub use policy::{PolicyError, PolicyTable, RetentionPolicy};
pub use report::{RepoOutcome, RunReport};
