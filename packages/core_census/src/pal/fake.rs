//! Simulated platform backing [`CoreCensus::fake()`][crate::CoreCensus::fake].

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::fake::CensusBuilder;
use crate::pal::{AffinityState, Platform};
use crate::{AffinityError, CoreId, PlatformError};

/// Platform implementation describing invented hardware, with simulated pinning.
///
/// Reports exactly the cores its builder configured and never touches OS thread
/// affinity, which keeps tests runnable on machines of any size.
#[derive(Debug)]
pub(crate) struct FakePlatform {
    cores: Vec<CoreId>,
    denied_cores: Vec<CoreId>,
    fail_discovery: bool,

    /// Successful pinning operations performed through this platform.
    pin_count: AtomicUsize,

    /// Affinity restorations performed through this platform.
    restore_count: AtomicUsize,
}

impl FakePlatform {
    pub(crate) fn from_builder(builder: &CensusBuilder) -> Self {
        Self {
            cores: builder.cores().to_vec(),
            denied_cores: builder.denied_cores().to_vec(),
            fail_discovery: builder.fails_discovery(),
            pin_count: AtomicUsize::new(0),
            restore_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn pin_count(&self) -> usize {
        self.pin_count.load(Ordering::Relaxed)
    }

    pub(crate) fn restore_count(&self) -> usize {
        self.restore_count.load(Ordering::Relaxed)
    }
}

impl Platform for FakePlatform {
    fn physical_core_representatives(&self) -> Result<Vec<CoreId>, PlatformError> {
        if self.fail_discovery {
            return Err(PlatformError::QueryFailed {
                source: io::Error::new(io::ErrorKind::Unsupported, "simulated topology failure"),
            });
        }

        Ok(self.cores.clone())
    }

    fn pin_current_thread(&self, core: CoreId) -> Result<AffinityState, AffinityError> {
        if self.denied_cores.contains(&core) {
            return Err(AffinityError::PinDenied {
                core,
                source: io::Error::new(io::ErrorKind::PermissionDenied, "simulated pinning denial"),
            });
        }

        self.pin_count.fetch_add(1, Ordering::Relaxed);
        Ok(AffinityState::Simulated)
    }

    fn restore_current_thread(&self, previous: &AffinityState) -> Result<(), AffinityError> {
        debug_assert!(matches!(previous, AffinityState::Simulated));

        self.restore_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
