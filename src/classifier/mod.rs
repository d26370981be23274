//! Repository tier classifier.
//!
//! Maps a repository name to an environment tier by suffix/segment
//! convention. Names without a dev or staging marker classify as
//! production, so an ambiguous repository always gets the most
//! conservative retention policy.

use std::cmp::Ordering;
use std::fmt;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

mod explain;

pub use explain::ExplainOutput;

/// Environment tier driving retention strictness.
///
/// Ordered by conservatism: `Dev < Staging < Production`. The policy
/// loader leans on this ordering to enforce that production thresholds are
/// never tighter than staging's, and staging's never tighter than dev's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Development: aggressive cleanup
    Dev,
    /// Staging: moderate cleanup
    Staging,
    /// Production: most conservative, the fallback for unmarked names
    Production,
}

impl Tier {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Dev => "dev",
            Tier::Staging => "staging",
            Tier::Production => "production",
        }
    }

    /// Conservatism rank: higher keeps more.
    fn rank(&self) -> u8 {
        match self {
            Tier::Dev => 0,
            Tier::Staging => 1,
            Tier::Production => 2,
        }
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a repository name into a tier.
///
/// The trailing segment decides: `-dev`, `_dev`, `/dev` (and the staging
/// and prod equivalents) at the end of the name. A name with no recognized
/// marker, including a bare `dev`-containing word like "devtools", is
/// production. Total function, never errors.
pub fn classify(name: &str) -> Tier {
    match trailing_marker(name) {
        Some("dev") => Tier::Dev,
        Some("staging") => Tier::Staging,
        _ => Tier::Production,
    }
}

/// Extract the recognized trailing environment marker, if any.
fn trailing_marker(name: &str) -> Option<&'static str> {
    // Compiled per call; classification runs once per repository per run,
    // nowhere near a hot path.
    let pattern = Regex::new(r"(?:^|[-_/])(dev|staging|prod)$").expect("valid marker pattern");
    let capture = pattern.captures(name)?;
    match capture.get(1).map(|m| m.as_str()) {
        Some("dev") => Some("dev"),
        Some("staging") => Some("staging"),
        Some("prod") => Some("prod"),
        _ => None,
    }
}

/// Explain a classification for diagnostics (the `explain` subcommand).
pub fn explain(name: &str) -> ExplainOutput {
    let marker = trailing_marker(name);
    let tier = classify(name);
    ExplainOutput::new(name, tier, marker)
}
