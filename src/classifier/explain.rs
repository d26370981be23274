//! Explain output for the classifier.
//!
//! Structured JSON and human-readable explanations of tier decisions for
//! the `explain` subcommand.

use serde::{Deserialize, Serialize};

use super::Tier;

/// Explanation of a tier classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainOutput {
    /// The repository name that was classified
    pub repository: String,

    /// The resulting tier
    pub tier: Tier,

    /// The trailing marker that matched, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_marker: Option<String>,

    /// True when no marker matched and the conservative default applied
    pub fallback: bool,

    /// Human-readable explanation
    pub explanation: String,
}

impl ExplainOutput {
    /// Build the explanation for a classified name.
    pub fn new(repository: &str, tier: Tier, marker: Option<&str>) -> Self {
        let explanation = match marker {
            Some(marker) => format!(
                "'{repository}' ends with the '{marker}' segment, so it is a {tier} repository"
            ),
            None => format!(
                "'{repository}' has no recognized environment marker; \
                 defaulting to the most conservative tier (production)"
            ),
        };
        Self {
            repository: repository.to_string(),
            tier,
            matched_marker: marker.map(str::to_string),
            fallback: marker.is_none(),
            explanation,
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable form for terminal output.
    pub fn to_human(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Repository: {}\n", self.repository));
        out.push_str(&format!("Tier:       {}\n", self.tier));
        match &self.matched_marker {
            Some(marker) => out.push_str(&format!("Marker:     {marker}\n")),
            None => out.push_str("Marker:     (none, conservative fallback)\n"),
        }
        out.push_str(&format!("\n{}\n", self.explanation));
        out
    }
}
