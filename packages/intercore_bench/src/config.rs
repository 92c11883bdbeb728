use std::num::NonZero;
use std::time::Duration;

use core_census::CoreId;
use thiserror::Error;

/// Default length of one probe's measured window, in milliseconds.
pub const DEFAULT_TEST_PERIOD_MS: u64 = 5000;

/// Default settle pause between consecutive measurements, in milliseconds.
pub const DEFAULT_TEST_INTERVAL_MS: u64 = 1000;

/// Default size of the block copied per bandwidth handoff, in bytes.
pub const DEFAULT_COPY_BLOCK_SIZE: usize = 128 * 1024;

/// Default number of trials per measurement, of which the best one is kept.
pub const DEFAULT_ITERATIONS: u32 = 1;

/// Input parameters for the [`run`][crate::run] function, mirroring the
/// command-line surface before any validation has taken place.
#[doc(hidden)]
#[derive(Clone, Debug)]
#[allow(
    clippy::exhaustive_structs,
    reason = "This is a hidden struct for internal/test use only"
)]
pub struct RunInput {
    /// Measure round-trip synchronization latency between core pairs.
    pub latency: bool,
    /// Measure producer/consumer handoff bandwidth between core pairs.
    pub bandwidth: bool,
    /// Also measure bandwidth with producer and consumer roles swapped.
    pub reverse: bool,
    /// Size of the block copied per bandwidth handoff, in bytes.
    pub block_size: usize,
    /// Logical cores to test, in cpulist form. `None` means one representative
    /// core per physical core, as discovered from the system.
    pub cores: Option<String>,
    /// Settle pause between consecutive measurements, in milliseconds.
    pub interval_ms: u64,
    /// Length of one probe's measured window, in milliseconds.
    pub duration_ms: u64,
    /// Number of trials per measurement, of which the best one is kept.
    pub iterations: u32,
    /// Skip the discarded warm-up trial that precedes the first measurement.
    pub no_warmup: bool,
}

impl RunInput {
    /// The tool's original fixed settings, with no probe enabled.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            latency: false,
            bandwidth: false,
            reverse: false,
            block_size: DEFAULT_COPY_BLOCK_SIZE,
            cores: None,
            interval_ms: DEFAULT_TEST_INTERVAL_MS,
            duration_ms: DEFAULT_TEST_PERIOD_MS,
            iterations: DEFAULT_ITERATIONS,
            no_warmup: false,
        }
    }
}

/// Errors reported when the requested benchmark configuration is unusable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The requested test duration was zero.
    #[error("the test duration must be greater than zero")]
    ZeroDuration,

    /// The requested copy block size was zero.
    #[error("the copy block size must be greater than zero")]
    ZeroBlockSize,

    /// The requested iteration count was zero.
    #[error("the iteration count must be greater than zero")]
    ZeroIterations,

    /// Reverse bandwidth was requested without the bandwidth test itself.
    #[error("the reverse bandwidth test requires the bandwidth test to be enabled")]
    ReverseWithoutBandwidth,

    /// The explicit core list could not be parsed.
    #[error("invalid core list: {source}")]
    InvalidCoreList {
        /// The underlying cpulist parsing error.
        #[source]
        source: cpulist::Error,
    },

    /// Measuring anything between core pairs requires at least two cores.
    #[error("at least two distinct logical cores are required, {available} available")]
    NotEnoughCores {
        /// How many distinct cores were available for testing.
        available: usize,
    },
}

/// Validated benchmark settings, as consumed by the measurement session.
#[derive(Clone, Debug)]
pub(crate) struct BenchConfig {
    pub(crate) measure_latency: bool,
    pub(crate) measure_bandwidth: bool,
    pub(crate) reverse_bandwidth: bool,
    pub(crate) block_size: usize,
    /// Cores to test. `None` means discover one representative per physical core.
    pub(crate) explicit_cores: Option<Vec<CoreId>>,
    pub(crate) test_interval: Duration,
    pub(crate) test_duration: Duration,
    pub(crate) iterations: NonZero<u32>,
    pub(crate) warmup: bool,
}

impl BenchConfig {
    /// Validates raw input into a usable configuration.
    ///
    /// Duplicate entries in the core list collapse into one, per the usual
    /// cpulist semantics; a list that then holds fewer than two cores is
    /// rejected here, before any thread is spawned.
    pub(crate) fn from_input(input: &RunInput) -> Result<Self, ConfigError> {
        if input.duration_ms == 0 {
            return Err(ConfigError::ZeroDuration);
        }

        if input.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }

        if input.reverse && !input.bandwidth {
            return Err(ConfigError::ReverseWithoutBandwidth);
        }

        let iterations = NonZero::new(input.iterations).ok_or(ConfigError::ZeroIterations)?;

        let explicit_cores = match &input.cores {
            Some(list) => {
                let cores = cpulist::parse(list)
                    .map_err(|source| ConfigError::InvalidCoreList { source })?;

                if cores.len() < 2 {
                    return Err(ConfigError::NotEnoughCores {
                        available: cores.len(),
                    });
                }

                Some(cores)
            }
            None => None,
        };

        Ok(Self {
            measure_latency: input.latency,
            measure_bandwidth: input.bandwidth,
            reverse_bandwidth: input.reverse,
            block_size: input.block_size,
            explicit_cores,
            test_interval: Duration::from_millis(input.interval_ms),
            test_duration: Duration::from_millis(input.duration_ms),
            iterations,
            warmup: !input.no_warmup,
        })
    }
}
