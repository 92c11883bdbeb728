use std::sync::Barrier;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use core_census::{CoreCensus, CoreId};
use crossbeam_utils::CachePadded;

use crate::cancel::CancelToken;
use crate::sample::ProbeSample;

/// The pair of flag cells bounced between the two workers of a latency probe.
///
/// Each cell is written by one side and consumed by the other through a 1 -> 0
/// compare-and-swap, so at most one thread ever observes a given transition.
/// The padding keeps the two cells on separate cache lines; the migration of
/// those lines between the cores is the effect under measurement.
#[derive(Debug)]
struct FlagPair {
    to_a: CachePadded<AtomicU32>,
    to_b: CachePadded<AtomicU32>,
}

impl FlagPair {
    fn new() -> Self {
        Self {
            // Side A starts with its incoming flag raised, so exactly one
            // side begins in the ready state.
            to_a: CachePadded::new(AtomicU32::new(1)),
            to_b: CachePadded::new(AtomicU32::new(0)),
        }
    }

    fn side_a(&self) -> FlagSide<'_> {
        FlagSide {
            incoming: &self.to_a,
            outgoing: &self.to_b,
        }
    }

    fn side_b(&self) -> FlagSide<'_> {
        FlagSide {
            incoming: &self.to_b,
            outgoing: &self.to_a,
        }
    }
}

/// One worker's view of the flag pair.
#[derive(Clone, Copy, Debug)]
struct FlagSide<'a> {
    incoming: &'a CachePadded<AtomicU32>,
    outgoing: &'a CachePadded<AtomicU32>,
}

impl FlagSide<'_> {
    /// Attempts to consume the incoming signal, winning the current turn.
    fn try_consume(&self) -> bool {
        self.incoming
            .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Hands the turn to the partner.
    fn signal_partner(&self) {
        self.outgoing.store(1, Ordering::Release);
    }
}

/// Measures round-trip synchronization latency between two logical cores.
///
/// Two workers, one pinned to each core, bounce a pair of flag cells back and
/// forth in a busy-spin loop for roughly `duration`. The returned sample holds
/// the number of completed handshakes and the measured window; each full
/// handshake stands for two half-trips, which the presentation layer accounts
/// for when deriving nanoseconds.
///
/// A worker that cannot pin itself reports the failure on stderr and the trial
/// comes back degenerate instead of aborting the run.
// Timing-window mutations are not reliably observable in fast tests.
#[cfg_attr(test, mutants::skip)]
pub(crate) fn measure(
    census: &CoreCensus,
    core_a: CoreId,
    core_b: CoreId,
    duration: Duration,
) -> ProbeSample {
    let flags = FlagPair::new();
    let cancel = CancelToken::new();

    // Both workers and the coordinator meet here before any clock starts.
    let ready = Barrier::new(3);

    thread::scope(|s| {
        let worker_a = s.spawn(|| run_side(census, core_a, flags.side_a(), &cancel, &ready));
        let worker_b = s.spawn(|| run_side(census, core_b, flags.side_b(), &cancel, &ready));

        ready.wait();

        // Skip the measurement window if a worker already gave up.
        if !cancel.is_cancelled() {
            thread::sleep(duration);
        }

        cancel.cancel();

        let sample_a = join_side(worker_a);
        let sample_b = join_side(worker_b);

        sample_a.combined_with(sample_b)
    })
}

fn run_side(
    census: &CoreCensus,
    core: CoreId,
    flags: FlagSide<'_>,
    cancel: &CancelToken,
    ready: &Barrier,
) -> ProbeSample {
    let affinity = match census.pin_current_thread(core) {
        Ok(guard) => Some(guard),
        Err(error) => {
            // The sibling spins until cancellation, so a failed pin must not
            // leave it burning a core for the full window.
            eprintln!("latency worker could not pin itself to core {core}: {error}");
            cancel.cancel();
            None
        }
    };

    ready.wait();

    if affinity.is_none() {
        return ProbeSample::ZERO;
    }

    let started = Instant::now();
    let mut count = 0_u64;

    while !cancel.is_cancelled() {
        // No pause instruction in the retry path: the raw cache line bounce
        // is the effect under measurement.
        if flags.try_consume() {
            count = count
                .checked_add(1)
                .expect("handshake counter cannot overflow u64 within any practical window");
            flags.signal_partner();
        }
    }

    let elapsed = started.elapsed();

    // The thread keeps its affinity until the clock has stopped.
    drop(affinity);

    ProbeSample::new(count, elapsed)
}

fn join_side(handle: thread::ScopedJoinHandle<'_, ProbeSample>) -> ProbeSample {
    // A worker that panicked produced no usable numbers; treat it like any
    // other failed side.
    handle.join().unwrap_or(ProbeSample::ZERO)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use core_census::fake::CensusBuilder;

    use super::*;

    fn fake_census() -> CoreCensus {
        CoreCensus::fake(CensusBuilder::from_cores([0, 1]))
    }

    #[test]
    fn only_one_side_starts_ready() {
        let flags = FlagPair::new();

        assert!(!flags.side_b().try_consume());
        assert!(flags.side_a().try_consume());

        // The signal is consumed, not merely observed.
        assert!(!flags.side_a().try_consume());
    }

    #[test]
    fn signal_hands_the_turn_to_the_partner() {
        let flags = FlagPair::new();

        assert!(flags.side_a().try_consume());
        flags.side_a().signal_partner();

        assert!(flags.side_b().try_consume());
        flags.side_b().signal_partner();

        assert!(flags.side_a().try_consume());
    }

    #[test]
    fn handshakes_accumulate_between_two_workers() {
        let sample = measure(&fake_census(), 0, 1, Duration::from_millis(50));

        assert!(!sample.is_degenerate());
        assert!(sample.count() > 0);
    }

    #[test]
    fn elapsed_stays_close_to_the_requested_window() {
        let duration = Duration::from_millis(50);

        let sample = measure(&fake_census(), 0, 1, duration);

        // Generous slack; the assertion only guards against runaway loops.
        assert!(sample.elapsed() <= duration.checked_add(Duration::from_secs(2)).unwrap());
    }

    #[test]
    fn failed_pin_yields_degenerate_sample_without_waiting_out_the_window() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]).deny_pinning_to(0));
        let started = Instant::now();

        let sample = measure(&census, 0, 1, Duration::from_secs(10));

        assert!(sample.is_degenerate());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancelled_window_reports_zero_operations() {
        let flags = FlagPair::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let ready = Barrier::new(1);

        let sample = run_side(&fake_census(), 0, flags.side_a(), &cancel, &ready);

        assert_eq!(sample.count(), 0);
        assert!(sample.is_degenerate());
    }
}
