use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop signal shared by the two workers of one probe trial.
///
/// Workers poll the flag at the top of every loop iteration and nothing ever
/// blocks on it. A fresh token is created for every trial so no stale state
/// leaks from one trial into the next.
#[derive(Debug, Default)]
pub(crate) struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Asks both workers to finish their current iteration and return.
    pub(crate) fn cancel(&self) {
        // Relaxed suffices: the flag carries no data, it only ends the loops.
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
