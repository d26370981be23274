//! Cooperative cancellation for sweep runs (SIGINT/SIGTERM).
//!
//! The orchestrator checks the flag between repositories; an in-flight
//! deletion batch for the current repository is allowed to drain rather
//! than being interrupted, so a repository is never left half-evaluated.
//! A cancelled run still writes its (partial) report and exits 80.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit code for cancelled runs.
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Shared cancellation flag.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    /// New flag, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Install a ctrl-c handler that trips the flag.
///
/// The first signal requests a cooperative stop; the run finishes the
/// current repository, writes its report, and exits.
pub fn install(flag: Arc<CancelFlag>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        eprintln!("[sweep] cancellation requested, finishing current repository");
        flag.cancel();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_cancel_is_sticky() {
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_flag_shared_across_threads() {
        let flag = Arc::new(CancelFlag::new());
        let clone = Arc::clone(&flag);

        std::thread::spawn(move || clone.cancel()).join().unwrap();
        assert!(flag.is_cancelled());
    }
}
