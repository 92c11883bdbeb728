use std::fmt::Debug;
#[cfg(any(test, feature = "test-util"))]
use std::sync::Arc;

#[cfg(any(test, feature = "test-util"))]
use crate::pal::FakePlatform;
use crate::pal::{AffinityState, BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};
use crate::{AffinityError, CoreId, PlatformError};

/// Enum to hide the real/fake platform choice behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(any(test, feature = "test-util"))]
    Fake(Arc<FakePlatform>),
}

impl PlatformFacade {
    pub(crate) fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(any(test, feature = "test-util"))]
    pub(crate) fn from_fake(fake: FakePlatform) -> Self {
        Self::Fake(Arc::new(fake))
    }
}

impl Platform for PlatformFacade {
    fn physical_core_representatives(&self) -> Result<Vec<CoreId>, PlatformError> {
        match self {
            Self::Target(platform) => platform.physical_core_representatives(),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(platform) => platform.physical_core_representatives(),
        }
    }

    fn pin_current_thread(&self, core: CoreId) -> Result<AffinityState, AffinityError> {
        match self {
            Self::Target(platform) => platform.pin_current_thread(core),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(platform) => platform.pin_current_thread(core),
        }
    }

    fn restore_current_thread(&self, previous: &AffinityState) -> Result<(), AffinityError> {
        match self {
            Self::Target(platform) => platform.restore_current_thread(previous),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(platform) => platform.restore_current_thread(previous),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(inner) => inner.fmt(f),
        }
    }
}
