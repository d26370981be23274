//! Run phase state machine.
//!
//! Phases: QUEUED → COLLECTING → DECIDING → EXECUTING → (next repository
//! or REPORTING) → DONE. A per-repository error transitions straight to
//! the next repository's COLLECTING, never to a failure terminal; only
//! total registry unavailability aborts a run, and that happens before the
//! machine leaves QUEUED.

use serde::{Deserialize, Serialize};

/// Phase of a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Run created, repository list not yet fetched
    Queued,
    /// Fetching one repository's inventory
    Collecting,
    /// Computing decisions for one repository
    Deciding,
    /// Applying decisions for one repository
    Executing,
    /// Writing the run report
    Reporting,
    /// Terminal
    Done,
}

impl RunPhase {
    /// True for the terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done)
    }

    /// Check whether a transition to `target` is valid.
    pub fn can_transition_to(&self, target: RunPhase) -> bool {
        match (self, target) {
            (RunPhase::Queued, RunPhase::Collecting) => true,
            // Zero repositories still produces a report
            (RunPhase::Queued, RunPhase::Reporting) => true,

            // Collection failure skips to the next repository or, when it
            // was the last one, to reporting
            (RunPhase::Collecting, RunPhase::Deciding) => true,
            (RunPhase::Collecting, RunPhase::Collecting) => true,
            (RunPhase::Collecting, RunPhase::Reporting) => true,

            (RunPhase::Deciding, RunPhase::Executing) => true,

            (RunPhase::Executing, RunPhase::Collecting) => true,
            (RunPhase::Executing, RunPhase::Reporting) => true,

            (RunPhase::Reporting, RunPhase::Done) => true,

            _ => false,
        }
    }
}

/// Errors for run phase transitions.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunPhase, to: RunPhase },
}

/// Tracks the current phase and repository of a run.
#[derive(Debug)]
pub struct RunTracker {
    phase: RunPhase,
    current_repository: Option<String>,
}

impl RunTracker {
    /// New tracker in QUEUED.
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Queued,
            current_repository: None,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The repository currently being processed, if any.
    pub fn current_repository(&self) -> Option<&str> {
        self.current_repository.as_deref()
    }

    /// Transition to a new phase.
    pub fn transition(&mut self, target: RunPhase) -> Result<(), PhaseError> {
        if !self.phase.can_transition_to(target) {
            return Err(PhaseError::InvalidTransition {
                from: self.phase,
                to: target,
            });
        }
        self.phase = target;
        if matches!(target, RunPhase::Reporting | RunPhase::Done) {
            self.current_repository = None;
        }
        Ok(())
    }

    /// Enter COLLECTING for a repository.
    pub fn start_repository(&mut self, repository: &str) -> Result<(), PhaseError> {
        self.transition(RunPhase::Collecting)?;
        self.current_repository = Some(repository.to_string());
        Ok(())
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}
