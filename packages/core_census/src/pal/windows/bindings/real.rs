use std::fmt::Debug;
use std::io;

use windows::Win32::System::SystemInformation::{
    GetLogicalProcessorInformationEx, LOGICAL_PROCESSOR_RELATIONSHIP,
    SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX,
};
use windows::Win32::System::Threading::{GetCurrentThread, SetThreadAffinityMask};
use windows::core::Result;

use crate::pal::windows::Bindings;

/// FFI bindings that target the real operating system that the build is targeting.
///
/// You would only use different bindings in PAL unit tests that need to use mock bindings.
/// Even then, whenever possible, unit tests should use real bindings for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetBindings;

// Real operating system bindings are excluded from coverage measurement because:
// 1. They are tested via integration tests running on actual Windows.
// 2. The error paths depend on operating system state we do not control in tests.
#[cfg_attr(coverage_nightly, coverage(off))]
impl Bindings for BuildTargetBindings {
    unsafe fn get_logical_processor_information_ex(
        &self,
        relationship_type: LOGICAL_PROCESSOR_RELATIONSHIP,
        buffer: Option<*mut SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX>,
        returned_length: *mut u32,
    ) -> Result<()> {
        // SAFETY: Forwarding safety requirements to caller.
        unsafe { GetLogicalProcessorInformationEx(relationship_type, buffer, returned_length) }
    }

    fn set_current_thread_affinity_mask(&self, mask: usize) -> io::Result<usize> {
        // SAFETY: Returns a pseudo handle; always valid for the current thread.
        let thread = unsafe { GetCurrentThread() };

        // SAFETY: No pointer arguments; the mask is a plain bit pattern.
        let previous = unsafe { SetThreadAffinityMask(thread, mask) };

        if previous == 0 {
            // A zero return means the mask was not applied and nothing changed.
            return Err(io::Error::last_os_error());
        }

        Ok(previous)
    }
}
