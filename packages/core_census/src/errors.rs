use std::io;

use thiserror::Error;

use crate::CoreId;

/// Errors that can occur when querying the processor topology.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatformError {
    /// The operating system query for processor information failed.
    #[error("the operating system query for processor topology failed: {source}")]
    QueryFailed {
        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },

    /// The operating system returned processor topology data we could not interpret.
    #[error("malformed processor topology data: '{invalid_value}': {problem}")]
    MalformedData {
        /// The specific value that could not be interpreted.
        invalid_value: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// The topology query succeeded but did not yield any usable processors.
    #[error("the operating system reported no usable processors")]
    NoProcessors,
}

/// Errors that can occur when pinning a thread to a core or undoing such a pinning.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AffinityError {
    /// The requested core does not fit in the affinity mask this platform supports.
    #[error("core {core} exceeds the affinity mask width of this platform ({mask_width} bits)")]
    CoreOutOfRange {
        /// The core that was requested.
        core: CoreId,

        /// Number of bits in the affinity mask of the current platform.
        mask_width: u32,
    },

    /// The operating system did not allow the current thread to be pinned.
    #[error("the operating system refused to pin the current thread to core {core}: {source}")]
    PinDenied {
        /// The core that was requested.
        core: CoreId,

        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },

    /// The operating system did not allow the previous affinity to be reapplied.
    #[error("the operating system refused to restore the thread's previous affinity: {source}")]
    RestoreDenied {
        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(PlatformError: Error, Send, Sync, Debug);
    assert_impl_all!(AffinityError: Error, Send, Sync, Debug);

    #[test]
    fn platform_error_displays_problem() {
        let error = PlatformError::MalformedData {
            invalid_value: "potato".to_string(),
            problem: "not an integer".to_string(),
        };

        let message = error.to_string();
        assert!(message.contains("potato"));
        assert!(message.contains("not an integer"));
    }

    #[test]
    fn affinity_error_names_core() {
        let error = AffinityError::PinDenied {
            core: 7,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };

        assert!(error.to_string().contains('7'));
        assert!(error.source().is_some());
    }

    #[test]
    fn core_out_of_range_names_mask_width() {
        let error = AffinityError::CoreOutOfRange {
            core: 200,
            mask_width: 64,
        };

        let message = error.to_string();
        assert!(message.contains("200"));
        assert!(message.contains("64"));
    }
}
