//! Simulated processor topologies for testing.
//!
//! This module lets tests describe an invented machine instead of using the hardware the
//! test process happens to run on. Pinning against a simulated topology is recorded but
//! never touches real thread affinity, which keeps tests runnable on machines of any size
//! and in sandboxes that forbid affinity changes.
//!
//! Only available when the `test-util` feature is enabled.
//!
//! # Basic usage
//!
//! ```
//! use core_census::CoreCensus;
//! use core_census::fake::CensusBuilder;
//!
//! let census = CoreCensus::fake(CensusBuilder::from_cores([0, 2, 4]));
//!
//! let cores = census.physical_core_representatives().unwrap();
//! assert_eq!(cores.len(), 3);
//! ```
//!
//! # Designing testable code
//!
//! To make your code testable with simulated topologies, accept [`CoreCensus`][crate::CoreCensus]
//! as a parameter instead of always calling [`CoreCensus::current()`][crate::CoreCensus::current].
//! This allows tests to substitute a simulated topology while production code uses the
//! real one.
//!
//! ```
//! use core_census::{CoreCensus, PlatformError};
//!
//! fn worker_count(census: &CoreCensus) -> Result<usize, PlatformError> {
//!     Ok(census.physical_core_representatives()?.len())
//! }
//!
//! # use core_census::fake::CensusBuilder;
//! # let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]));
//! # assert_eq!(worker_count(&census).unwrap(), 2);
//! ```

use crate::CoreId;

/// Builder for configuring a simulated processor topology.
///
/// The topology is described as the list of logical core IDs that act as physical core
/// representatives. IDs do not need to be contiguous - real machines with SMT report
/// gaps, and simulated ones may do the same.
///
/// # Example
///
/// ```
/// use core_census::CoreCensus;
/// use core_census::fake::CensusBuilder;
///
/// // A four-core machine where pinning to core 6 is forbidden by policy.
/// let census = CoreCensus::fake(
///     CensusBuilder::from_cores([0, 2, 4, 6]).deny_pinning_to(6),
/// );
///
/// assert!(census.pin_current_thread(0).is_ok());
/// assert!(census.pin_current_thread(6).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct CensusBuilder {
    cores: Vec<CoreId>,
    denied_cores: Vec<CoreId>,
    fail_discovery: bool,
}

impl CensusBuilder {
    /// Creates a builder describing a machine with no cores at all.
    ///
    /// Discovery against such a topology reports
    /// [`PlatformError::NoProcessors`][crate::PlatformError::NoProcessors], which makes
    /// the empty builder useful for exercising error paths.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cores: Vec::new(),
            denied_cores: Vec::new(),
            fail_discovery: false,
        }
    }

    /// Creates a builder describing a machine with the given physical core representatives.
    #[must_use]
    pub fn from_cores(cores: impl IntoIterator<Item = CoreId>) -> Self {
        Self {
            cores: cores.into_iter().collect(),
            denied_cores: Vec::new(),
            fail_discovery: false,
        }
    }

    /// Marks a core as un-pinnable, simulating an operating system policy denial.
    ///
    /// Pinning to this core will report
    /// [`AffinityError::PinDenied`][crate::AffinityError::PinDenied].
    #[must_use]
    pub fn deny_pinning_to(mut self, core: CoreId) -> Self {
        self.denied_cores.push(core);
        self
    }

    /// Makes topology discovery itself fail, simulating an operating system query error.
    #[must_use]
    pub fn fail_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    pub(crate) fn cores(&self) -> &[CoreId] {
        &self.cores
    }

    pub(crate) fn denied_cores(&self) -> &[CoreId] {
        &self.denied_cores
    }

    pub(crate) fn fails_discovery(&self) -> bool {
        self.fail_discovery
    }
}

impl Default for CensusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
