#![cfg_attr(test, expect(
    clippy::struct_field_names,
    reason = "false positive from automock generated code"
))]

use std::fmt::Debug;
use std::io;

/// Linux has this funny notion of exposing various OS APIs as a virtual filesystem. This trait
/// abstracts this virtual filesystem to allow it to be mocked.
///
/// The scope of this trait is limited to only the virtual filesystem exposed by the OS. We do not
/// expect to do "real" file I/O in this layer. All I/O is synchronous and blocking because we
/// expect it to hit a fast path in the OS, given the data is never on a real storage device.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Debug + Send + Sync + 'static {
    /// Get the contents of the /sys/devices/system/cpu/online file.
    ///
    /// This lists all currently online processors, in cpulist format
    /// ("0,1,2-4,5-10:2" style list). Failure to read it means the topology
    /// cannot be determined at all.
    fn get_online_cpus_contents(&self) -> Result<String, io::Error>;

    /// Get the contents of the /sys/devices/system/cpu/cpu{}/topology/core_id file,
    /// or `None` if the kernel does not expose topology data for this processor.
    ///
    /// This is a single line holding one integer. Some virtual machines and minimal
    /// kernel configurations do not provide the topology directory at all.
    fn get_cpu_core_id_contents(&self, cpu_index: u32) -> Option<String>;

    /// Get the contents of the /sys/devices/system/cpu/cpu{}/topology/physical_package_id
    /// file, or `None` if the kernel does not expose topology data for this processor.
    ///
    /// This is a single line holding one integer.
    fn get_cpu_package_id_contents(&self, cpu_index: u32) -> Option<String>;
}
