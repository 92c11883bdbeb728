#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Inter-core measurements and hardware-aware scheduling start from two questions: which
//! logical processors stand for distinct physical cores, and how do I make a thread stay
//! on one of them? This package answers both, hiding the operating system differences
//! behind one small API.
//!
//! # What it does
//!
//! * [`CoreCensus::physical_core_representatives()`][1] returns one logical core ID per
//!   physical core, so callers iterate real cores instead of SMT siblings that share all
//!   their caches and execution resources.
//! * [`CoreCensus::pin_current_thread()`][2] restricts the calling thread to a single
//!   logical core and hands back a guard that restores the previous affinity when dropped.
//!
//! Topology and affinity are served by the operating system (Linux via sysfs and
//! `sched_setaffinity`, Windows via `GetLogicalProcessorInformationEx` and
//! `SetThreadAffinityMask`). On other platforms, and under Miri, a fallback treats every
//! unit of available parallelism as its own core and simulates pinning.
//!
//! # Quick start
//!
//! ```rust
//! use core_census::CoreCensus;
//!
//! let census = CoreCensus::current();
//!
//! let cores = census.physical_core_representatives()?;
//! let count = cores.len();
//! println!("{count} physical cores: {cores:?}");
//! # Ok::<(), core_census::PlatformError>(())
//! ```
//!
//! Pinning restores the previous affinity mask when the guard goes out of scope:
//!
//! ```rust,no_run
//! use core_census::CoreCensus;
//!
//! let census = CoreCensus::current();
//! let cores = census.physical_core_representatives()?;
//!
//! {
//!     let _guard = census.pin_current_thread(*cores.first())?;
//!     // Thread now executes only on the first physical core.
//! }
//! // Previous affinity applies again here.
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Testing support
//!
//! With the `test-util` feature enabled, [`CoreCensus::fake()`][3] creates a census
//! backed by a synthetic topology with simulated pinning, so tests of dependent packages
//! can exercise multi-core logic on any machine. See the [`fake`] module.
//!
//! [1]: CoreCensus::physical_core_representatives
//! [2]: CoreCensus::pin_current_thread
//! [3]: CoreCensus::fake

mod census;
mod core_id;
mod errors;
mod pal;

pub use census::*;
pub use core_id::*;
pub use errors::*;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
