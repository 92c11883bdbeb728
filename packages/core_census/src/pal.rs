//! Platform Abstraction Layer (PAL). Private API hiding operating system differences
//! behind the [`Platform`] trait.

mod abstractions;
pub(crate) use abstractions::*;

mod facade;
pub(crate) use facade::*;

#[cfg(any(test, feature = "test-util"))]
mod fake;
#[cfg(any(test, feature = "test-util"))]
pub(crate) use fake::*;

#[cfg(all(target_os = "linux", not(miri)))]
mod linux;
#[cfg(all(target_os = "linux", not(miri)))]
pub(crate) use linux::*;

#[cfg(all(windows, not(miri)))]
mod windows;
#[cfg(all(windows, not(miri)))]
pub(crate) use windows::*;

// The fallback implementation serves operating systems without topology and affinity
// support, and all Miri runs.
#[cfg(any(miri, not(any(target_os = "linux", windows))))]
mod fallback;
#[cfg(any(miri, not(any(target_os = "linux", windows))))]
pub(crate) use fallback::*;
