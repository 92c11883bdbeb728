use std::fmt::Debug;

#[cfg(all(target_os = "linux", not(miri)))]
use libc::cpu_set_t;

use crate::{AffinityError, CoreId, PlatformError};

/// The topology and affinity surface a platform implementation provides.
///
/// All operating system interaction goes through this trait, so tests can substitute a
/// simulated platform.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// One logical core ID per physical core, in ascending order.
    fn physical_core_representatives(&self) -> Result<Vec<CoreId>, PlatformError>;

    /// Restricts the current thread to `core`, returning the state needed to undo this.
    fn pin_current_thread(&self, core: CoreId) -> Result<AffinityState, AffinityError>;

    /// Reapplies previously captured affinity state to the current thread.
    fn restore_current_thread(&self, previous: &AffinityState) -> Result<(), AffinityError>;
}

/// Thread affinity state captured before a pinning operation, in the platform's
/// native representation.
pub(crate) enum AffinityState {
    /// Affinity mask of the thread at the time of capture.
    #[cfg(all(target_os = "linux", not(miri)))]
    Linux(Box<cpu_set_t>),

    /// Affinity mask of the thread at the time of capture.
    #[cfg(all(windows, not(miri)))]
    Windows(usize),

    /// The pinning was simulated; there is nothing to restore.
    #[cfg(any(test, feature = "test-util", miri, not(any(target_os = "linux", windows))))]
    Simulated,
}

impl Debug for AffinityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(all(target_os = "linux", not(miri)))]
            Self::Linux(_) => f.write_str("Linux(..)"),
            #[cfg(all(windows, not(miri)))]
            Self::Windows(mask) => f.debug_tuple("Windows").field(mask).finish(),
            #[cfg(any(test, feature = "test-util", miri, not(any(target_os = "linux", windows))))]
            Self::Simulated => f.write_str("Simulated"),
        }
    }
}
