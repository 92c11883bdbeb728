//! Benchmarking one compare-and-swap handshake round trip between two pinned
//! cores, the primitive the latency probe counts in bulk.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::sync::Barrier;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use core_census::{CoreCensus, CoreId};
use criterion::{Criterion, criterion_group, criterion_main};
use crossbeam_utils::CachePadded;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let census = CoreCensus::current();

    let cores: Vec<CoreId> = match census.physical_core_representatives() {
        Ok(cores) => cores.into_iter().collect(),
        Err(error) => {
            eprintln!("skipping handshake benchmark, topology unavailable: {error}");
            return;
        }
    };

    let (first, second) = match (cores.first(), cores.get(1)) {
        (Some(&first), Some(&second)) => (first, second),
        _ => {
            eprintln!("skipping handshake benchmark, needs at least two physical cores");
            return;
        }
    };

    c.bench_function("cas_handshake_round_trip", |b| {
        b.iter_custom(|round_trips| measure_round_trips(census, first, second, round_trips));
    });
}

fn measure_round_trips(
    census: &CoreCensus,
    core_a: CoreId,
    core_b: CoreId,
    round_trips: u64,
) -> Duration {
    let to_a = CachePadded::new(AtomicU32::new(1));
    let to_b = CachePadded::new(AtomicU32::new(0));
    let ready = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            // Best effort; an unpinned benchmark still runs, just noisier.
            let _affinity = census.pin_current_thread(core_b);

            ready.wait();

            for _ in 0..round_trips {
                while to_b
                    .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
                    .is_err()
                {}

                to_a.store(1, Ordering::Release);
            }
        });

        let _affinity = census.pin_current_thread(core_a);

        ready.wait();

        let clock = Instant::now();

        for _ in 0..round_trips {
            while to_a
                .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {}

            to_b.store(1, Ordering::Release);
        }

        clock.elapsed()
    })
}
