#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Measures the cost of moving data between processor cores: synchronization
//! latency and producer/consumer handoff bandwidth, probed over every pair of
//! cores and reported as CSV matrices.
//!
//! Latency is measured by bouncing a cache line between two pinned threads
//! with a compare-and-swap handshake and counting round trips. Bandwidth is
//! measured by copying blocks through a shared staging buffer, producer on
//! one core and consumer on the other, with the synchronization cost
//! deliberately included in the result.
//!
//! This crate provides the measurement engine, exposed via the [`run`]
//! function. The binary entry point is in `main.rs`.

mod bandwidth;
mod cancel;
mod config;
mod latency;
mod matrix;
mod quiet;
mod report;
mod sample;
mod session;
mod trial;

use std::io;

use core_census::{AffinityError, CoreCensus, PlatformError};
use thiserror::Error;

use crate::config::BenchConfig;
pub use crate::config::{
    ConfigError, DEFAULT_COPY_BLOCK_SIZE, DEFAULT_ITERATIONS, DEFAULT_TEST_INTERVAL_MS,
    DEFAULT_TEST_PERIOD_MS, RunInput,
};
use crate::session::MeasurementSession;

/// The outcome of a successful run.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(
    clippy::exhaustive_enums,
    reason = "This is a hidden enum for internal/test use only"
)]
pub enum RunOutcome {
    /// Every requested measurement ran and the result matrices were written.
    Completed,
    /// No probe was requested, so nothing ran.
    NothingRequested,
}

/// Errors that can occur during a run.
#[doc(hidden)]
#[derive(Debug, Error)]
#[allow(
    clippy::exhaustive_enums,
    reason = "This is a hidden enum for internal/test use only"
)]
pub enum RunError {
    /// The input did not describe a runnable measurement.
    #[error("invalid configuration: {source}")]
    Config {
        /// The underlying configuration problem.
        #[from]
        source: ConfigError,
    },

    /// The processor topology could not be determined.
    #[error("failed to inspect the processor topology: {source}")]
    Platform {
        /// The underlying platform problem.
        #[from]
        source: PlatformError,
    },

    /// A core in the measured list could not be pinned to.
    #[error("failed to apply processor affinity: {source}")]
    Affinity {
        /// The underlying affinity problem.
        #[from]
        source: AffinityError,
    },

    /// Writing results to the output failed.
    #[error("failed to write results: {source}")]
    Output {
        /// The underlying I/O problem.
        #[from]
        source: io::Error,
    },
}

/// Core logic of the tool, extracted for testability.
///
/// Probes every unordered pair of the measured cores with the probes `input`
/// enables, writing one progress line per probe and the final result matrices
/// to `output`.
///
/// This function contains all the business logic without any process-global
/// dependencies like `std::env::args()`, making it suitable for direct
/// testing.
#[doc(hidden)]
pub fn run(input: &RunInput, output: &mut impl io::Write) -> Result<RunOutcome, RunError> {
    run_with_census(input, output, CoreCensus::current())
}

/// Internal implementation of `run` that accepts the processor census to
/// measure, so tests can substitute a fake one.
fn run_with_census(
    input: &RunInput,
    output: &mut impl io::Write,
    census: &CoreCensus,
) -> Result<RunOutcome, RunError> {
    if !input.latency && !input.bandwidth {
        return Ok(RunOutcome::NothingRequested);
    }

    let config = BenchConfig::from_input(input)?;

    MeasurementSession::new(census, config).run(output)?;

    Ok(RunOutcome::Completed)
}
