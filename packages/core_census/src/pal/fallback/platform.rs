use std::num::NonZeroUsize;
use std::sync::OnceLock;
use std::thread;

use crate::pal::{AffinityState, Platform};
use crate::{AffinityError, CoreId, PlatformError};

/// Fallback platform implementation for operating systems without native support.
///
/// This implementation provides graceful degradation on unsupported platforms by:
/// - Using `std::thread::available_parallelism()` to determine the core count
/// - Treating every unit of available parallelism as its own physical core
/// - Pretending to pin threads without actual OS-level affinity changes
///
/// This allows code to compile and run on any platform, though without the measurement
/// fidelity that real processor pinning provides.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

static CORE_COUNT: OnceLock<u32> = OnceLock::new();

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform::new();

impl BuildTargetPlatform {
    pub(crate) const fn new() -> Self {
        Self
    }
}

fn core_count() -> u32 {
    *CORE_COUNT.get_or_init(|| {
        let count = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        u32::try_from(count).unwrap_or(u32::MAX)
    })
}

impl Platform for BuildTargetPlatform {
    fn physical_core_representatives(&self) -> Result<Vec<CoreId>, PlatformError> {
        Ok((0..core_count()).collect())
    }

    fn pin_current_thread(&self, core: CoreId) -> Result<AffinityState, AffinityError> {
        if core >= core_count() {
            return Err(AffinityError::CoreOutOfRange {
                core,
                mask_width: core_count(),
            });
        }

        Ok(AffinityState::Simulated)
    }

    fn restore_current_thread(&self, _previous: &AffinityState) -> Result<(), AffinityError> {
        Ok(())
    }
}
