use std::io;

use core_census::CoreId;
use derive_more::derive::Display;
use itertools::Itertools;

use crate::matrix::ResultMatrix;
use crate::sample::ProbeSample;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub(crate) enum ProbeKind {
    #[display("latency")]
    Latency,

    #[display("bandwidth")]
    Bandwidth,
}

/// Writes the progress prefix for one probe, without a trailing newline. The
/// matching result writer completes the line once the probe returns.
pub(crate) fn write_probe_prefix(
    output: &mut impl io::Write,
    kind: ProbeKind,
    first: CoreId,
    second: CoreId,
) -> io::Result<()> {
    write!(output, "Testing {kind} between logical core {first} and {second}... ")?;

    // The probe runs for seconds after this; the prefix has to be visible
    // while it does.
    output.flush()
}

pub(crate) fn write_latency_result(
    output: &mut impl io::Write,
    sample: ProbeSample,
) -> io::Result<()> {
    if sample.is_degenerate() {
        return writeln!(output, "no result");
    }

    writeln!(
        output,
        "{:.0} ns ({} synchronizations in {} ms)",
        one_way_latency_nanos(sample),
        sample.count(),
        sample.elapsed().as_millis()
    )
}

pub(crate) fn write_bandwidth_result(
    output: &mut impl io::Write,
    sample: ProbeSample,
    block_size: usize,
) -> io::Result<()> {
    if sample.is_degenerate() {
        return writeln!(output, "no result");
    }

    let copied = gigabytes_copied(sample, block_size);
    let per_second = copied / sample.elapsed().as_secs_f64();

    writeln!(
        output,
        "{per_second:.2} GB/s ({copied:.2} GB copied in {} ms)",
        sample.elapsed().as_millis()
    )
}

/// Writes the CSV result matrices that close out a run, one per measured
/// probe kind, each preceded by a blank line and a title.
///
/// The header row is a leading empty cell followed by the core ids; every
/// data row starts with its core id. Cells where no measurement was taken,
/// the diagonal included, stay empty, as do cells whose measurement came
/// back degenerate.
pub(crate) fn write_matrices(
    output: &mut impl io::Write,
    cores: &[CoreId],
    latency: Option<&ResultMatrix>,
    bandwidth: Option<&ResultMatrix>,
    block_size: usize,
) -> io::Result<()> {
    if let Some(matrix) = latency {
        writeln!(output)?;
        writeln!(output, "Latency (ns):")?;
        write_matrix(output, cores, matrix, |sample| {
            format!("{:.0}", one_way_latency_nanos(sample))
        })?;
    }

    if let Some(matrix) = bandwidth {
        writeln!(output)?;
        writeln!(output, "Bandwidth (MB/s):")?;
        write_matrix(output, cores, matrix, |sample| {
            format!("{:.2}", megabytes_per_second(sample, block_size))
        })?;
    }

    Ok(())
}

fn write_matrix(
    output: &mut impl io::Write,
    cores: &[CoreId],
    matrix: &ResultMatrix,
    mut render_cell: impl FnMut(ProbeSample) -> String,
) -> io::Result<()> {
    assert_eq!(
        matrix.size(),
        cores.len(),
        "the matrix must be indexed by the same core list it is rendered with"
    );

    let header = cores.iter().map(|core| core.to_string()).join(",");
    writeln!(output, ",{header}")?;

    for (row, &core) in cores.iter().enumerate() {
        write!(output, "{core}")?;

        for column in 0..cores.len() {
            let cell = matrix
                .get(row, column)
                .filter(|sample| !sample.is_degenerate())
                .map(&mut render_cell)
                .unwrap_or_default();

            write!(output, ",{cell}")?;
        }

        writeln!(output)?;
    }

    Ok(())
}

/// Nanoseconds per one-way hop: the handshake count tallies round trips, and
/// each round trip is two hops.
fn one_way_latency_nanos(sample: ProbeSample) -> f64 {
    const NANOS_PER_SEC: f64 = 1_000_000_000.0;

    sample.elapsed().as_secs_f64() * NANOS_PER_SEC / operations(sample) / 2.0
}

fn gigabytes_copied(sample: ProbeSample, block_size: usize) -> f64 {
    const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

    bytes_copied(sample, block_size) / BYTES_PER_GB
}

fn megabytes_per_second(sample: ProbeSample, block_size: usize) -> f64 {
    const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

    bytes_copied(sample, block_size) / BYTES_PER_MB / sample.elapsed().as_secs_f64()
}

#[expect(
    clippy::cast_precision_loss,
    reason = "block sizes stay far below 2^52, where f64 starts losing integer precision"
)]
fn bytes_copied(sample: ProbeSample, block_size: usize) -> f64 {
    operations(sample) * (block_size as f64)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "counts stay far below 2^52, where f64 starts losing integer precision"
)]
fn operations(sample: ProbeSample) -> f64 {
    sample.count() as f64
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;

    const BLOCK_SIZE: usize = 128 * 1024;

    fn render(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut sink = Vec::new();
        write(&mut sink).unwrap();
        String::from_utf8(sink).unwrap()
    }

    #[test]
    fn prefix_names_the_probe_kind_and_both_cores() {
        let line = render(|sink| write_probe_prefix(sink, ProbeKind::Latency, 3, 5));

        assert_eq!(line, "Testing latency between logical core 3 and 5... ");
    }

    #[test]
    fn prefix_preserves_the_core_order_it_is_given() {
        let line = render(|sink| write_probe_prefix(sink, ProbeKind::Bandwidth, 5, 3));

        assert_eq!(line, "Testing bandwidth between logical core 5 and 3... ");
    }

    #[test]
    fn latency_result_reports_one_way_nanoseconds() {
        // 25M round trips in 5 s is 100 ns per one-way hop.
        let sample = ProbeSample::new(25_000_000, Duration::from_secs(5));

        let line = render(|sink| write_latency_result(sink, sample));

        assert_eq!(line, "100 ns (25000000 synchronizations in 5000 ms)\n");
    }

    #[test]
    fn degenerate_latency_result_prints_no_result() {
        let line = render(|sink| write_latency_result(sink, ProbeSample::ZERO));

        assert_eq!(line, "no result\n");
    }

    #[test]
    fn bandwidth_result_reports_gigabytes_copied_and_rate() {
        // 40960 blocks of 128 KiB is exactly 5 GiB; over 2 s that is 2.5 GB/s.
        let sample = ProbeSample::new(40960, Duration::from_secs(2));

        let line = render(|sink| write_bandwidth_result(sink, sample, BLOCK_SIZE));

        assert_eq!(line, "2.50 GB/s (5.00 GB copied in 2000 ms)\n");
    }

    #[test]
    fn degenerate_bandwidth_result_prints_no_result() {
        let line = render(|sink| write_bandwidth_result(sink, ProbeSample::ZERO, BLOCK_SIZE));

        assert_eq!(line, "no result\n");
    }

    #[test]
    fn matrices_render_as_csv_with_core_id_headers() {
        let cores = [3, 5];

        let mut latency = ResultMatrix::new(2);
        latency.set_symmetric(0, 1, ProbeSample::new(25_000_000, Duration::from_secs(5)));

        let mut bandwidth = ResultMatrix::new(2);
        bandwidth.set_symmetric(0, 1, ProbeSample::new(40960, Duration::from_secs(2)));

        let text = render(|sink| {
            write_matrices(sink, &cores, Some(&latency), Some(&bandwidth), BLOCK_SIZE)
        });

        assert_eq!(
            text,
            "\nLatency (ns):\n\
             ,3,5\n\
             3,,100\n\
             5,100,\n\
             \nBandwidth (MB/s):\n\
             ,3,5\n\
             3,,2560.00\n\
             5,2560.00,\n"
        );
    }

    #[test]
    fn only_the_measured_matrix_is_rendered() {
        let cores = [0, 1];

        let mut latency = ResultMatrix::new(2);
        latency.set_symmetric(0, 1, ProbeSample::new(1000, Duration::from_secs(1)));

        let text = render(|sink| write_matrices(sink, &cores, Some(&latency), None, BLOCK_SIZE));

        assert!(text.contains("Latency (ns):"));
        assert!(!text.contains("Bandwidth"));
    }

    #[test]
    fn degenerate_cells_render_empty() {
        let cores = [0, 1];

        let mut latency = ResultMatrix::new(2);
        latency.set_symmetric(0, 1, ProbeSample::ZERO);

        let text = render(|sink| write_matrices(sink, &cores, Some(&latency), None, BLOCK_SIZE));

        assert_eq!(text, "\nLatency (ns):\n,0,1\n0,,\n1,,\n");
    }
}
