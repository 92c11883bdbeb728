use std::fmt::Debug;
use std::io;

use windows::Win32::System::SystemInformation::{
    LOGICAL_PROCESSOR_RELATIONSHIP, SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX,
};
use windows::core::Result;

/// Bindings for FFI calls into external libraries (either provided by operating system or not).
///
/// All PAL FFI calls must go through this trait, enabling them to be mocked.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Bindings: Debug + Send + Sync + 'static {
    // GetLogicalProcessorInformationEx()
    //
    // # Safety
    //
    // `buffer` must be valid for writes of `*returned_length` bytes (or None for the size
    // probe) and both pointers must outlive the call.
    unsafe fn get_logical_processor_information_ex(
        &self,
        relationship_type: LOGICAL_PROCESSOR_RELATIONSHIP,
        buffer: Option<*mut SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX>,
        returned_length: *mut u32,
    ) -> Result<()>;

    // SetThreadAffinityMask() for the current thread; returns the previous mask.
    fn set_current_thread_affinity_mask(&self, mask: usize) -> io::Result<usize>;
}
