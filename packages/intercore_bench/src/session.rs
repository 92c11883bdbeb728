use std::io;
use std::time::Duration;

use core_census::{CoreCensus, CoreId};
use itertools::Itertools;

use crate::RunError;
use crate::bandwidth;
use crate::config::{BenchConfig, ConfigError};
use crate::latency;
use crate::matrix::ResultMatrix;
use crate::quiet::QuietWindow;
use crate::report::{self, ProbeKind};
use crate::sample::ProbeSample;
use crate::trial;

/// How long the discarded warm-up probes spin. Start-up costs are one-time
/// constants, so a short window flushes them out without noticeably
/// lengthening the run.
const WARM_UP_DURATION: Duration = Duration::from_millis(100);

/// One full measurement run: resolves the core list, probes every unordered
/// core pair and renders the result matrices.
#[derive(Debug)]
pub(crate) struct MeasurementSession<'a> {
    census: &'a CoreCensus,
    config: BenchConfig,
}

/// What a completed run measured, indexed by position in `cores`.
#[derive(Debug)]
pub(crate) struct MeasurementOutcome {
    pub(crate) cores: Vec<CoreId>,
    pub(crate) latency: Option<ResultMatrix>,
    pub(crate) bandwidth: Option<ResultMatrix>,
}

impl<'a> MeasurementSession<'a> {
    pub(crate) fn new(census: &'a CoreCensus, config: BenchConfig) -> Self {
        Self { census, config }
    }

    /// Runs every configured probe over every unordered core pair, writing
    /// one progress line per probe and the final matrices to `output`.
    ///
    /// The core list is verified up front: if any core in it cannot be
    /// pinned to, the run fails before the first probe instead of limping
    /// through a grid of degenerate cells.
    pub(crate) fn run(
        &self,
        output: &mut impl io::Write,
    ) -> Result<MeasurementOutcome, RunError> {
        let cores = self.resolve_cores()?;
        self.verify_affinity(&cores)?;

        let quiet = QuietWindow::new(self.config.test_interval);

        if self.config.warmup {
            self.warm_up(&cores, &quiet);
        }

        let mut latency_matrix = self
            .config
            .measure_latency
            .then(|| ResultMatrix::new(cores.len()));
        let mut bandwidth_matrix = self
            .config
            .measure_bandwidth
            .then(|| ResultMatrix::new(cores.len()));

        for ((first, &core_a), (second, &core_b)) in
            cores.iter().enumerate().tuple_combinations()
        {
            if let Some(matrix) = latency_matrix.as_mut() {
                self.latency_pair(output, &quiet, matrix, (first, second), (core_a, core_b))?;
            }

            if let Some(matrix) = bandwidth_matrix.as_mut() {
                self.bandwidth_pair(output, &quiet, matrix, (first, second), (core_a, core_b))?;
            }
        }

        report::write_matrices(
            output,
            &cores,
            latency_matrix.as_ref(),
            bandwidth_matrix.as_ref(),
            self.config.block_size,
        )?;

        Ok(MeasurementOutcome {
            cores,
            latency: latency_matrix,
            bandwidth: bandwidth_matrix,
        })
    }

    fn resolve_cores(&self) -> Result<Vec<CoreId>, RunError> {
        let cores: Vec<CoreId> = match self.config.explicit_cores.as_ref() {
            Some(explicit) => explicit.clone(),
            None => self
                .census
                .physical_core_representatives()?
                .into_iter()
                .collect(),
        };

        if cores.len() < 2 {
            return Err(ConfigError::NotEnoughCores {
                available: cores.len(),
            }
            .into());
        }

        assert!(
            cores.iter().all_unique(),
            "the measured core list cannot contain duplicates"
        );

        Ok(cores)
    }

    /// Pins the calling thread to each core once, restoring immediately, so
    /// a run that is doomed to fail pinning fails here instead of partway
    /// through the measurement grid.
    fn verify_affinity(&self, cores: &[CoreId]) -> Result<(), RunError> {
        for &core in cores {
            let affinity = self.census.pin_current_thread(core)?;
            drop(affinity);
        }

        Ok(())
    }

    /// One discarded probe per enabled kind, on the first pair, so one-time
    /// start-up costs (first thread spawns, first faults in freshly mapped
    /// pages) are not charged to a recorded measurement. Writes nothing.
    fn warm_up(&self, cores: &[CoreId], quiet: &QuietWindow) {
        let first = *cores
            .first()
            .expect("a resolved core list always holds at least two cores");
        let second = *cores
            .get(1)
            .expect("a resolved core list always holds at least two cores");

        if self.config.measure_latency {
            _ = quiet.around(|| latency::measure(self.census, first, second, WARM_UP_DURATION));
        }

        if self.config.measure_bandwidth {
            _ = quiet.around(|| {
                bandwidth::measure(
                    self.census,
                    first,
                    second,
                    self.config.block_size,
                    WARM_UP_DURATION,
                )
            });
        }
    }

    fn latency_pair(
        &self,
        output: &mut impl io::Write,
        quiet: &QuietWindow,
        matrix: &mut ResultMatrix,
        (first, second): (usize, usize),
        (core_a, core_b): (CoreId, CoreId),
    ) -> Result<(), RunError> {
        report::write_probe_prefix(output, ProbeKind::Latency, core_a, core_b)?;

        let sample = quiet.around(|| self.best_latency(core_a, core_b));

        report::write_latency_result(output, sample)?;
        matrix.set_symmetric(first, second, sample);

        Ok(())
    }

    fn bandwidth_pair(
        &self,
        output: &mut impl io::Write,
        quiet: &QuietWindow,
        matrix: &mut ResultMatrix,
        (first, second): (usize, usize),
        (core_a, core_b): (CoreId, CoreId),
    ) -> Result<(), RunError> {
        report::write_probe_prefix(output, ProbeKind::Bandwidth, core_a, core_b)?;

        let forward = quiet.around(|| self.best_bandwidth(core_a, core_b));

        report::write_bandwidth_result(output, forward, self.config.block_size)?;

        if self.config.reverse_bandwidth {
            matrix.set_directional(first, second, forward);

            report::write_probe_prefix(output, ProbeKind::Bandwidth, core_b, core_a)?;

            let reverse = quiet.around(|| self.best_bandwidth(core_b, core_a));

            report::write_bandwidth_result(output, reverse, self.config.block_size)?;
            matrix.set_directional(second, first, reverse);
        } else {
            matrix.set_symmetric(first, second, forward);
        }

        Ok(())
    }

    fn best_latency(&self, core_a: CoreId, core_b: CoreId) -> ProbeSample {
        trial::best_of(self.config.iterations, || {
            latency::measure(self.census, core_a, core_b, self.config.test_duration)
        })
    }

    fn best_bandwidth(&self, producer: CoreId, consumer: CoreId) -> ProbeSample {
        trial::best_of(self.config.iterations, || {
            bandwidth::measure(
                self.census,
                producer,
                consumer,
                self.config.block_size,
                self.config.test_duration,
            )
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use core_census::fake::CensusBuilder;
    use new_zealand::nz;

    use super::*;

    fn fast_config() -> BenchConfig {
        BenchConfig {
            measure_latency: false,
            measure_bandwidth: false,
            reverse_bandwidth: false,
            block_size: 4096,
            explicit_cores: None,
            test_interval: Duration::ZERO,
            test_duration: Duration::from_millis(25),
            iterations: nz!(1),
            warmup: false,
        }
    }

    fn run_session(
        census: &CoreCensus,
        config: BenchConfig,
    ) -> (Result<MeasurementOutcome, RunError>, String) {
        let mut sink = Vec::new();
        let session = MeasurementSession::new(census, config);

        let outcome = session.run(&mut sink);

        (outcome, String::from_utf8(sink).unwrap())
    }

    #[test]
    fn full_run_fills_symmetric_matrices() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1, 2]));
        let config = BenchConfig {
            measure_latency: true,
            measure_bandwidth: true,
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);
        let outcome = outcome.unwrap();

        assert_eq!(outcome.cores, vec![0, 1, 2]);

        for matrix in [
            outcome.latency.as_ref().unwrap(),
            outcome.bandwidth.as_ref().unwrap(),
        ] {
            for (i, j) in (0..3).tuple_combinations() {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
                assert!(matrix.get(i, j).is_some_and(|sample| !sample.is_degenerate()));
            }

            for i in 0..3 {
                assert_eq!(matrix.get(i, i), None);
            }
        }

        assert_eq!(text.matches("Testing latency").count(), 3);
        assert_eq!(text.matches("Testing bandwidth").count(), 3);
        assert!(text.contains("Latency (ns):"));
        assert!(text.contains("Bandwidth (MB/s):"));
    }

    #[test]
    fn latency_only_run_produces_no_bandwidth_output() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]));
        let config = BenchConfig {
            measure_latency: true,
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);
        let outcome = outcome.unwrap();

        assert!(outcome.latency.is_some());
        assert!(outcome.bandwidth.is_none());
        assert!(!text.contains("Bandwidth"));
    }

    #[test]
    fn reverse_mode_measures_each_direction_separately() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]));
        let config = BenchConfig {
            measure_bandwidth: true,
            reverse_bandwidth: true,
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);
        let outcome = outcome.unwrap();
        let matrix = outcome.bandwidth.unwrap();

        assert!(matrix.get(0, 1).is_some());
        assert!(matrix.get(1, 0).is_some());
        assert_eq!(text.matches("Testing bandwidth").count(), 2);
        assert!(text.contains("Testing bandwidth between logical core 1 and 0"));
    }

    #[test]
    fn explicit_cores_override_discovery() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1, 2, 3]));
        let config = BenchConfig {
            measure_latency: true,
            explicit_cores: Some(vec![1, 3]),
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);
        let outcome = outcome.unwrap();

        assert_eq!(outcome.cores, vec![1, 3]);
        assert!(text.contains("Testing latency between logical core 1 and 3"));
        assert!(text.contains(",1,3"));
    }

    #[test]
    fn warm_up_probes_write_nothing() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]));
        let config = BenchConfig {
            measure_latency: true,
            warmup: true,
            test_duration: Duration::from_millis(10),
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);

        assert!(outcome.is_ok());
        assert_eq!(text.matches("Testing latency").count(), 1);
    }

    #[test]
    fn single_core_census_refuses_to_run() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0]));
        let config = BenchConfig {
            measure_latency: true,
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);

        assert!(matches!(
            outcome,
            Err(RunError::Config {
                source: ConfigError::NotEnoughCores { available: 1 }
            })
        ));
        assert!(text.is_empty());
    }

    #[test]
    fn failed_discovery_surfaces_as_platform_error() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]).fail_discovery());
        let config = BenchConfig {
            measure_latency: true,
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);

        assert!(matches!(outcome, Err(RunError::Platform { .. })));
        assert!(text.is_empty());
    }

    #[test]
    fn unpinnable_core_aborts_the_run_before_any_probe() {
        let census = CoreCensus::fake(CensusBuilder::from_cores([0, 1]).deny_pinning_to(1));
        let config = BenchConfig {
            measure_latency: true,
            ..fast_config()
        };

        let (outcome, text) = run_session(&census, config);

        assert!(matches!(outcome, Err(RunError::Affinity { .. })));
        assert!(text.is_empty());
    }
}
