#[cfg(any(test, feature = "test-util"))]
use std::borrow::Borrow;
use std::sync::OnceLock;

use negative_impl::negative_impl;
use nonempty::NonEmpty;

#[cfg(any(test, feature = "test-util"))]
use crate::fake::CensusBuilder;
#[cfg(any(test, feature = "test-util"))]
use crate::pal::FakePlatform;
use crate::pal::{AffinityState, Platform, PlatformFacade};
use crate::{AffinityError, CoreId, PlatformError};

/// The set of physical processor cores available to this process, with the ability to
/// pin the current thread to any one of them.
///
/// Obtain an instance via [`current()`][Self::current] to describe the machine the
/// process runs on, or via [`fake()`][Self::fake] to describe an invented machine in
/// tests. Clones are equivalent and refer to the same underlying platform.
///
/// # Example
///
/// ```
/// use core_census::CoreCensus;
///
/// let census = CoreCensus::current();
///
/// let cores = census.physical_core_representatives()?;
/// let count = cores.len();
/// println!("{count} physical cores available");
/// # Ok::<(), core_census::PlatformError>(())
/// ```
#[derive(Clone, Debug)]
pub struct CoreCensus {
    platform: PlatformFacade,
}

static CURRENT_CENSUS: OnceLock<CoreCensus> = OnceLock::new();

impl CoreCensus {
    /// Returns the census of the machine the current process is executing on.
    #[must_use]
    pub fn current() -> &'static Self {
        CURRENT_CENSUS.get_or_init(|| Self::from_platform(PlatformFacade::target()))
    }

    /// Creates a census describing invented hardware, for testing purposes.
    ///
    /// This method is only available when the `test-util` feature is enabled. Pinning
    /// through such a census is simulated and never changes real thread affinity, so
    /// tests behave identically on machines of any size.
    ///
    /// # Example
    ///
    /// ```
    /// use core_census::CoreCensus;
    /// use core_census::fake::CensusBuilder;
    ///
    /// let census = CoreCensus::fake(CensusBuilder::from_cores([0, 2]));
    ///
    /// let cores = census.physical_core_representatives()?;
    /// assert_eq!(cores.len(), 2);
    /// # Ok::<(), core_census::PlatformError>(())
    /// ```
    #[cfg(any(test, feature = "test-util"))]
    #[must_use]
    pub fn fake(builder: impl Borrow<CensusBuilder>) -> Self {
        let backend = FakePlatform::from_builder(builder.borrow());
        Self::from_platform(PlatformFacade::from_fake(backend))
    }

    fn from_platform(platform: PlatformFacade) -> Self {
        Self { platform }
    }

    /// Returns one logical core ID per physical core, in ascending order.
    ///
    /// Each returned ID is the lowest-numbered logical core of its physical core, so on
    /// machines with SMT the list skips the sibling hyperthreads. Every ID is valid for
    /// [`pin_current_thread()`][Self::pin_current_thread].
    pub fn physical_core_representatives(&self) -> Result<NonEmpty<CoreId>, PlatformError> {
        let cores = self.platform.physical_core_representatives()?;

        NonEmpty::from_vec(cores).ok_or(PlatformError::NoProcessors)
    }

    /// Restricts the current thread to the given core until the returned guard goes away.
    ///
    /// The guard restores the thread affinity that was in effect before the call, either
    /// when dropped or explicitly via [`AffinityGuard::restore()`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use core_census::CoreCensus;
    ///
    /// let census = CoreCensus::current();
    /// let cores = census.physical_core_representatives()?;
    ///
    /// {
    ///     let _guard = census.pin_current_thread(*cores.first())?;
    ///     // Thread now executes only on the first physical core.
    /// }
    /// // Previous affinity applies again here.
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn pin_current_thread(&self, core: CoreId) -> Result<AffinityGuard, AffinityError> {
        let previous = self.platform.pin_current_thread(core)?;

        Ok(AffinityGuard {
            platform: self.platform.clone(),
            previous: Some(previous),
        })
    }
}

/// Keeps the current thread pinned to a single core for as long as it exists.
///
/// Dropping the guard restores the thread affinity captured when the pinning was applied.
/// A restoration failure during drop is silently ignored; call
/// [`restore()`][Self::restore] instead where that failure needs to be observed.
#[derive(Debug)]
#[must_use = "thread affinity reverts when the guard is dropped, so hold it while pinned work runs"]
pub struct AffinityGuard {
    platform: PlatformFacade,

    /// Consumed by whichever of `restore()` and `drop()` runs first.
    previous: Option<AffinityState>,
}

// The guard undoes the pinning on the thread that created it. Moving it to another
// thread would restore the captured affinity to the wrong thread.
#[negative_impl]
impl !Send for AffinityGuard {}
#[negative_impl]
impl !Sync for AffinityGuard {}

impl AffinityGuard {
    /// Restores the previously captured thread affinity, reporting any failure.
    pub fn restore(mut self) -> Result<(), AffinityError> {
        match self.previous.take() {
            Some(previous) => self.platform.restore_current_thread(&previous),
            None => Ok(()),
        }
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // Nothing sensible can be done about a failure here.
            _ = self.platform.restore_current_thread(&previous);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(CoreCensus: Clone, Send, Sync);
    assert_not_impl_any!(AffinityGuard: Send, Sync);

    fn fake_platform(census: &CoreCensus) -> &FakePlatform {
        match &census.platform {
            PlatformFacade::Fake(fake) => fake,
            PlatformFacade::Target(_) => panic!("only used with simulated platforms"),
        }
    }

    #[test]
    fn current_census_reports_at_least_one_core() {
        let census = CoreCensus::current();

        // Every machine this test runs on has at least one physical core.
        census.physical_core_representatives().unwrap();
    }

    #[test]
    fn fake_topology_round_trips_cores() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 2, 4]));

        let cores = census.physical_core_representatives().unwrap();

        assert_eq!(Vec::from(cores), vec![0, 2, 4]);
    }

    #[test]
    fn empty_topology_reports_no_processors() {
        let census = CoreCensus::fake(CensusBuilder::new());

        let result = census.physical_core_representatives();

        assert!(matches!(result, Err(PlatformError::NoProcessors)));
    }

    #[test]
    fn simulated_discovery_failure_is_reported() {
        let census = CoreCensus::fake(CensusBuilder::new().fail_discovery());

        let result = census.physical_core_representatives();

        assert!(matches!(result, Err(PlatformError::QueryFailed { .. })));
    }

    #[test]
    fn pinning_to_denied_core_is_refused() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]).deny_pinning_to(1));

        let result = census.pin_current_thread(1);

        assert!(matches!(
            result,
            Err(AffinityError::PinDenied { core: 1, .. })
        ));
    }

    #[test]
    fn drop_restores_affinity_exactly_once() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]));

        {
            let _guard = census.pin_current_thread(1).unwrap();

            assert_eq!(fake_platform(&census).pin_count(), 1);
            assert_eq!(fake_platform(&census).restore_count(), 0);
        }

        assert_eq!(fake_platform(&census).restore_count(), 1);
    }

    #[test]
    fn explicit_restore_consumes_the_guard() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0]));

        let guard = census.pin_current_thread(0).unwrap();
        guard.restore().unwrap();

        // Dropping inside restore() must not have produced a second restoration.
        assert_eq!(fake_platform(&census).restore_count(), 1);
    }

    #[test]
    fn clones_share_the_same_simulated_platform() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]));
        let clone = census.clone();

        let _guard = clone.pin_current_thread(0).unwrap();

        assert_eq!(fake_platform(&census).pin_count(), 1);
    }
}
