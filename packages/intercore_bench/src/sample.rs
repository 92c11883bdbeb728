use std::time::Duration;

/// Raw outcome of one probe trial: how many operations completed and how long
/// the measured window lasted.
///
/// The sample deliberately keeps the raw numbers instead of a derived rate so
/// that a trial with zero completed operations stays representable without any
/// division taking place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ProbeSample {
    count: u64,
    elapsed: Duration,
}

impl ProbeSample {
    /// The sample reported by a worker that never completed any operation,
    /// such as one that failed to pin itself to its processor.
    pub(crate) const ZERO: Self = Self {
        count: 0,
        elapsed: Duration::ZERO,
    };

    pub(crate) fn new(count: u64, elapsed: Duration) -> Self {
        Self { count, elapsed }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// A degenerate trial observed no completed operations (or no elapsed
    /// time, which amounts to the same thing). Such a trial carries no signal
    /// and is surfaced as "no result" instead of entering any calculation.
    pub(crate) fn is_degenerate(&self) -> bool {
        self.count == 0 || self.elapsed.is_zero()
    }

    /// Completed operations per second. Degenerate samples score zero, which
    /// ranks them below every real sample during trial selection.
    pub(crate) fn throughput(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }

        #[expect(
            clippy::cast_precision_loss,
            reason = "counts stay far below 2^52, where f64 starts losing integer precision"
        )]
        let count = self.count as f64;

        count / self.elapsed.as_secs_f64()
    }

    /// Merges the two sides of one trial into the reported sample.
    ///
    /// Only the operations both sides completed and the time window both sides
    /// were demonstrably running can be credited to the pair, so each field
    /// takes the smaller of the two values.
    pub(crate) fn combined_with(self, other: Self) -> Self {
        Self {
            count: self.count.min(other.count),
            elapsed: self.elapsed.min(other.elapsed),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn zero_sample_is_degenerate() {
        assert!(ProbeSample::ZERO.is_degenerate());
    }

    #[test]
    fn sample_without_operations_is_degenerate() {
        let sample = ProbeSample::new(0, Duration::from_secs(5));

        assert!(sample.is_degenerate());
    }

    #[test]
    fn sample_without_elapsed_time_is_degenerate() {
        let sample = ProbeSample::new(1234, Duration::ZERO);

        assert!(sample.is_degenerate());
    }

    #[test]
    fn ordinary_sample_is_not_degenerate() {
        let sample = ProbeSample::new(1234, Duration::from_millis(10));

        assert!(!sample.is_degenerate());
    }

    #[test]
    fn throughput_is_operations_per_second() {
        let sample = ProbeSample::new(1000, Duration::from_millis(500));

        let throughput = sample.throughput();

        assert!((throughput - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_sample_has_zero_throughput() {
        let sample = ProbeSample::new(0, Duration::from_secs(5));

        assert!(sample.throughput().abs() < f64::EPSILON);
    }

    #[test]
    fn combining_takes_the_smaller_count_and_window() {
        let a = ProbeSample::new(100, Duration::from_millis(900));
        let b = ProbeSample::new(99, Duration::from_millis(1000));

        let combined = a.combined_with(b);

        assert_eq!(combined, ProbeSample::new(99, Duration::from_millis(900)));
    }

    #[test]
    fn combining_with_a_zero_side_is_degenerate() {
        let a = ProbeSample::new(100, Duration::from_millis(900));

        let combined = a.combined_with(ProbeSample::ZERO);

        assert!(combined.is_degenerate());
    }
}
