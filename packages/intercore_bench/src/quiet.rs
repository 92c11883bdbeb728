use std::ptr;
use std::thread;
use std::time::Duration;

/// Keeps measurement-boundary noise out of the timed windows.
///
/// The runtime performs no background memory reclamation, so there is nothing
/// to actively suppress while a probe runs; the probes also allocate nothing
/// inside their hot loops. What remains of the discipline is deterministic
/// teardown (a probe's resources are dropped before it returns) and a settle
/// pause between consecutive measurements, so cache and thermal transients
/// from one probe do not bleed into the next.
#[derive(Debug)]
pub(crate) struct QuietWindow {
    settle: Duration,
}

impl QuietWindow {
    pub(crate) fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// Runs one measurement, then lets the system settle before the next.
    pub(crate) fn around<T>(&self, measurement: impl FnOnce() -> T) -> T {
        let result = measurement();

        thread::sleep(self.settle);

        result
    }
}

const PAGE_SIZE: usize = 4096;

/// Touches every page of the buffer so first-touch page faults are paid here,
/// outside any timed window. The contents are left unchanged.
// Page residency is not observable from tests.
#[cfg_attr(test, mutants::skip)]
pub(crate) fn prefault(bytes: &mut [u8]) {
    for byte in bytes.iter_mut().step_by(PAGE_SIZE) {
        let value = *byte;

        // SAFETY: `byte` is a valid exclusive reference. The write is volatile
        // so the page touch survives even though the stored value is the one
        // already there.
        unsafe { ptr::write_volatile(byte, value) };
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn around_returns_the_measurement_result() {
        let window = QuietWindow::new(Duration::ZERO);

        assert_eq!(window.around(|| 42), 42);
    }

    #[test]
    fn around_settles_after_the_measurement_not_before() {
        let window = QuietWindow::new(Duration::from_millis(30));
        let started = Instant::now();

        let measured_at = window.around(Instant::now);

        assert!(measured_at.duration_since(started) < Duration::from_millis(30));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn prefault_leaves_contents_unchanged() {
        let mut bytes = vec![7_u8; 3 * PAGE_SIZE + 17];

        prefault(&mut bytes);

        assert!(bytes.iter().all(|&byte| byte == 7));
    }

    #[test]
    fn prefault_accepts_an_empty_buffer() {
        prefault(&mut []);
    }
}
