use std::cell::UnsafeCell;
use std::sync::Barrier;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

use core_census::{CoreCensus, CoreId};
use rand::Rng;
use rsevents::{AutoResetEvent, Awaitable, EventState};

use crate::cancel::CancelToken;
use crate::quiet;
use crate::sample::ProbeSample;

/// The staging buffer handed back and forth between producer and consumer.
///
/// The auto-reset event pair around it enforces strict alternation: a worker
/// touches the bytes only between consuming its own event token and raising
/// the partner's, so access is exclusive even though the cell is unguarded.
#[derive(Debug)]
struct StagingBuffer {
    bytes: UnsafeCell<Box<[u8]>>,
}

impl StagingBuffer {
    fn new(block_size: usize) -> Self {
        let mut bytes = vec![0_u8; block_size].into_boxed_slice();
        quiet::prefault(&mut bytes);

        Self {
            bytes: UnsafeCell::new(bytes),
        }
    }

    /// # Safety
    ///
    /// The caller must hold the turn: it has consumed an event token and has
    /// not yet raised the partner's event.
    unsafe fn fill_from(&self, source: &[u8]) {
        // SAFETY: Holding the turn makes this the only thread accessing the
        // bytes right now.
        let bytes = unsafe { &mut *self.bytes.get() };

        bytes.copy_from_slice(source);
    }

    /// # Safety
    ///
    /// The caller must hold the turn: it has consumed an event token and has
    /// not yet raised the partner's event.
    unsafe fn drain_into(&self, destination: &mut [u8]) {
        // SAFETY: Holding the turn makes this the only thread accessing the
        // bytes right now.
        let bytes = unsafe { &*self.bytes.get() };

        destination.copy_from_slice(bytes);
    }
}

// SAFETY: Access to the bytes alternates between the two workers under the
// auto-reset event pair; only the thread holding the turn dereferences the
// cell.
unsafe impl Sync for StagingBuffer {}

/// Measures block handoff bandwidth from one core to another over the given
/// wall-clock window.
///
/// A producer pinned to `producer_core` copies a random-filled source block
/// into a shared staging buffer and a consumer pinned to `consumer_core`
/// copies it onward into a destination block, the two alternating turns via a
/// pair of auto-reset events. The sample counts completed block copies on the
/// slower side.
///
/// All three buffers are allocated, filled and pre-faulted before the clock
/// starts. A failure to pin either worker yields a degenerate sample.
// The measurement window is wall-clock timing; mutations to it are not
// reliably observable in fast tests.
#[cfg_attr(test, mutants::skip)]
pub(crate) fn measure(
    census: &CoreCensus,
    producer_core: CoreId,
    consumer_core: CoreId,
    block_size: usize,
    duration: Duration,
) -> ProbeSample {
    if block_size == 0 {
        // Nothing would be copied; report the trial as degenerate instead of
        // spinning up workers to count empty handoffs.
        return ProbeSample::ZERO;
    }

    let mut source = vec![0_u8; block_size];
    rand::rng().fill(source.as_mut_slice());

    let mut destination = vec![0_u8; block_size];
    quiet::prefault(&mut destination);

    let staging = StagingBuffer::new(block_size);

    // The producer takes the first turn, so its event starts raised.
    let staging_free = AutoResetEvent::new(EventState::Set);
    let staged = AutoResetEvent::new(EventState::Unset);

    let cancel = CancelToken::new();

    // Both workers plus this coordinating thread.
    let ready = Barrier::new(3);

    thread::scope(|s| {
        let producer = s.spawn(|| {
            run_worker(census, producer_core, &staging_free, &staged, &cancel, &ready, || {
                // SAFETY: This runs between consuming `staging_free` and
                // raising `staged`, so this thread holds the turn.
                unsafe { staging.fill_from(&source) };
            })
        });

        let consumer = s.spawn(|| {
            run_worker(census, consumer_core, &staged, &staging_free, &cancel, &ready, || {
                // SAFETY: This runs between consuming `staged` and raising
                // `staging_free`, so this thread holds the turn.
                unsafe { staging.drain_into(&mut destination) };
            })
        });

        ready.wait();

        // Skip the measurement window if a worker already gave up.
        if !cancel.is_cancelled() {
            thread::sleep(duration);
        }

        cancel.cancel();

        let producer_sample = join_worker(producer);
        let consumer_sample = join_worker(consumer);

        producer_sample.combined_with(consumer_sample)
    })
}

fn run_worker(
    census: &CoreCensus,
    core: CoreId,
    wait_for_turn: &AutoResetEvent,
    hand_over: &AutoResetEvent,
    cancel: &CancelToken,
    ready: &Barrier,
    mut copy_block: impl FnMut(),
) -> ProbeSample {
    let affinity = match census.pin_current_thread(core) {
        Ok(affinity) => Some(affinity),
        Err(error) => {
            eprintln!("bandwidth worker could not pin itself to core {core}: {error}");
            cancel.cancel();
            None
        }
    };

    // The partner and the coordinator are both waiting for us, whether we
    // managed to pin ourselves or not.
    ready.wait();

    let sample = if affinity.is_some() {
        let clock = Instant::now();
        let mut count: u64 = 0;

        while !cancel.is_cancelled() {
            wait_for_turn.wait();

            copy_block();

            count = count
                .checked_add(1)
                .expect("block counter cannot overflow u64 within any practical window");

            hand_over.set();
        }

        let elapsed = clock.elapsed();

        ProbeSample::new(count, elapsed)
    } else {
        ProbeSample::ZERO
    };

    // One parting signal on every exit path, so a partner parked on its event
    // always wakes up and can observe the cancellation.
    hand_over.set();

    // The thread keeps its affinity until the clock has stopped.
    drop(affinity);

    sample
}

fn join_worker(worker: ScopedJoinHandle<'_, ProbeSample>) -> ProbeSample {
    // A panicked worker contributes nothing, which makes the combined sample
    // degenerate rather than tearing down the whole run.
    worker.join().unwrap_or(ProbeSample::ZERO)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use core_census::fake::CensusBuilder;

    use super::*;

    const TWO_CORES: [CoreId; 2] = [0, 1];

    #[test]
    fn staging_carries_bytes_from_source_to_destination() {
        let staging = StagingBuffer::new(8);
        let source = [5_u8; 8];
        let mut destination = [0_u8; 8];

        // SAFETY: Single-threaded test, so no other thread can touch the
        // staging bytes.
        unsafe { staging.fill_from(&source) };

        // SAFETY: Same as above.
        unsafe { staging.drain_into(&mut destination) };

        assert_eq!(destination, source);
    }

    #[test]
    fn copies_accumulate_between_producer_and_consumer() {
        let census = CoreCensus::fake(CensusBuilder::from_cores(TWO_CORES));

        let sample = measure(&census, 0, 1, 4096, Duration::from_millis(50));

        assert!(sample.count() >= 1);
        assert!(!sample.elapsed().is_zero());
        assert!(!sample.is_degenerate());
    }

    #[test]
    fn zero_block_size_is_degenerate_without_waiting_out_the_window() {
        let census = CoreCensus::fake(CensusBuilder::from_cores(TWO_CORES));
        let clock = Instant::now();

        let sample = measure(&census, 0, 1, 0, Duration::from_secs(10));

        assert!(sample.is_degenerate());
        assert!(clock.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn failed_producer_pin_yields_degenerate_sample_without_waiting_out_the_window() {
        let census = CoreCensus::fake(CensusBuilder::from_cores(TWO_CORES).deny_pinning_to(0));
        let clock = Instant::now();

        let sample = measure(&census, 0, 1, 4096, Duration::from_secs(10));

        assert!(sample.is_degenerate());
        assert!(clock.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn failed_consumer_pin_yields_degenerate_sample_without_waiting_out_the_window() {
        let census = CoreCensus::fake(CensusBuilder::from_cores(TWO_CORES).deny_pinning_to(1));
        let clock = Instant::now();

        let sample = measure(&census, 0, 1, 4096, Duration::from_secs(10));

        assert!(sample.is_degenerate());
        assert!(clock.elapsed() < Duration::from_secs(5));
    }
}
