#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the intercore-bench tool.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::io;
use std::process::ExitCode;

use argh::FromArgs;
use intercore_bench::{
    DEFAULT_COPY_BLOCK_SIZE, DEFAULT_ITERATIONS, DEFAULT_TEST_INTERVAL_MS, DEFAULT_TEST_PERIOD_MS,
    RunInput, RunOutcome, run,
};

/// Measures synchronization latency and handoff bandwidth between every pair
/// of processor cores, printing progress per pair and CSV result matrices at
/// the end.
#[derive(FromArgs)]
struct Args {
    /// measure round-trip synchronization latency between core pairs
    #[argh(switch, short = 'l')]
    latency: bool,

    /// measure producer/consumer handoff bandwidth between core pairs
    #[argh(switch, short = 'b')]
    bandwidth: bool,

    /// also measure bandwidth with producer and consumer roles swapped
    #[argh(switch, short = 'r')]
    reverse: bool,

    /// size of the block copied per bandwidth handoff, in bytes
    #[argh(option, default = "DEFAULT_COPY_BLOCK_SIZE")]
    block_size: usize,

    /// comma-separated logical core ids to test, e.g. "0,2,4-7"; defaults to
    /// one core per physical core
    #[argh(option)]
    cores: Option<String>,

    /// pause between consecutive measurements, in milliseconds
    #[argh(option, default = "DEFAULT_TEST_INTERVAL_MS")]
    interval_ms: u64,

    /// length of one probe's measured window, in milliseconds
    #[argh(option, default = "DEFAULT_TEST_PERIOD_MS")]
    duration_ms: u64,

    /// number of trials per measurement, of which the best one is kept
    #[argh(option, default = "DEFAULT_ITERATIONS")]
    iterations: u32,

    /// skip the discarded warm-up trial before the first measurement
    #[argh(switch)]
    no_warmup: bool,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let input = RunInput {
        latency: args.latency,
        bandwidth: args.bandwidth,
        reverse: args.reverse,
        block_size: args.block_size,
        cores: args.cores,
        interval_ms: args.interval_ms,
        duration_ms: args.duration_ms,
        iterations: args.iterations,
        no_warmup: args.no_warmup,
    };

    match run(&input, &mut io::stdout()) {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::NothingRequested) => {
            print_usage();
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Prints the same text `--help` would, for invocations that selected no
/// probe at all.
// Exercised only via the process entry point, same as main.
#[cfg_attr(test, mutants::skip)]
fn print_usage() {
    if let Err(early_exit) = Args::from_args(&["intercore-bench"], &["--help"]) {
        println!("{}", early_exit.output);
    }
}
