use std::mem;

use windows::Win32::Foundation::ERROR_INSUFFICIENT_BUFFER;
use windows::Win32::System::SystemInformation::{
    RelationProcessorCore, SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX,
};
use windows::core::HRESULT;

use crate::pal::windows::{Bindings, BindingsFacade};
use crate::pal::{AffinityState, Platform};
use crate::{AffinityError, CoreId, PlatformError};

/// The platform that matches the target platform of the current build.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    bindings: BindingsFacade,
}

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform =
    BuildTargetPlatform::new(BindingsFacade::target());

impl BuildTargetPlatform {
    pub(crate) const fn new(bindings: BindingsFacade) -> Self {
        Self { bindings }
    }

    /// Retrieves the raw processor core relationship records from the operating system.
    ///
    /// Returns the backing storage and the number of bytes the operating system wrote.
    /// The storage is over-allocated by one full record so whole-record reads near the
    /// end cannot run out of bounds even when the final record is truncated.
    fn query_core_relationships(&self) -> Result<(Vec<u64>, usize), PlatformError> {
        loop {
            let mut required_length: u32 = 0;

            // SAFETY: Pointers must outlive the call (true - local variable lives beyond call).
            let probe_result = unsafe {
                self.bindings.get_logical_processor_information_ex(
                    RelationProcessorCore,
                    None,
                    &raw mut required_length,
                )
            };

            match probe_result {
                // A zero-length success means there are no records at all.
                Ok(()) => return Ok((Vec::new(), 0)),
                Err(error) if error.code() == HRESULT::from_win32(ERROR_INSUFFICIENT_BUFFER.0) => {}
                Err(error) => {
                    return Err(PlatformError::QueryFailed {
                        source: error.into(),
                    });
                }
            }

            let required = usize::try_from(required_length)
                .expect("u32 always fits in usize on supported platforms");
            let record_stride = mem::size_of::<SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX>();

            let element_count = required
                .div_ceil(mem::size_of::<u64>())
                .checked_add(record_stride.div_ceil(mem::size_of::<u64>()))
                .expect("buffer sizes are tiny compared to usize::MAX");

            // u64 elements keep the buffer aligned for the record type.
            let mut buffer: Vec<u64> = vec![0; element_count];
            let mut used_length = required_length;

            // SAFETY: Pointers must outlive the call (true - local variables live beyond call)
            // and the buffer is writable for at least `required_length` bytes.
            let fill_result = unsafe {
                self.bindings.get_logical_processor_information_ex(
                    RelationProcessorCore,
                    Some(buffer.as_mut_ptr().cast()),
                    &raw mut used_length,
                )
            };

            match fill_result {
                Ok(()) => {
                    let used = usize::try_from(used_length)
                        .expect("u32 always fits in usize on supported platforms");

                    return Ok((buffer, used));
                }
                // The set of processors can change between the two calls. Super unlikely
                // but if it happens we just start over.
                Err(error) if error.code() == HRESULT::from_win32(ERROR_INSUFFICIENT_BUFFER.0) => {}
                Err(error) => {
                    return Err(PlatformError::QueryFailed {
                        source: error.into(),
                    });
                }
            }
        }
    }
}

impl Platform for BuildTargetPlatform {
    fn physical_core_representatives(&self) -> Result<Vec<CoreId>, PlatformError> {
        let (buffer, used) = self.query_core_relationships()?;

        let mut representatives = Vec::new();
        let base = buffer.as_ptr().cast::<u8>();
        let mut offset = 0_usize;

        // The records returned by the OS are dynamically sized, so we have only various
        // disgusting options for parsing them. Pointer wrangling is the most readable.
        while offset < used {
            // SAFETY: `offset` is below `used`, which is within the allocation.
            let record_ptr = unsafe { base.add(offset) };

            // SAFETY: The allocation extends one full record past `used`, so reading a
            // whole record from any in-range offset stays within the allocation.
            let record = unsafe {
                record_ptr
                    .cast::<SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX>()
                    .read_unaligned()
            };

            let record_size = usize::try_from(record.Size)
                .expect("u32 always fits in usize on supported platforms");

            if record_size == 0 {
                return Err(PlatformError::MalformedData {
                    invalid_value: "0".to_string(),
                    problem: "processor relationship record declares a zero size".to_string(),
                });
            }

            if record.Relationship == RelationProcessorCore {
                // SAFETY: The relationship type says the union holds processor core data.
                let processor = unsafe { record.Anonymous.Processor };

                // API docs: if the record represents a processor core, GroupCount is always 1.
                let group_mask = processor.GroupMask[0];

                // Cores in processor groups beyond the first are out of reach for the
                // classic affinity mask, so they are not usable for pinning.
                if group_mask.Group == 0 {
                    if let Some(core) = lowest_set_bit(group_mask.Mask) {
                        representatives.push(core);
                    }
                }
            }

            offset = offset
                .checked_add(record_size)
                .expect("record offsets are tiny compared to usize::MAX");
        }

        if representatives.is_empty() {
            return Err(PlatformError::NoProcessors);
        }

        representatives.sort_unstable();

        Ok(representatives)
    }

    fn pin_current_thread(&self, core: CoreId) -> Result<AffinityState, AffinityError> {
        let mask_width = affinity_mask_width();

        if core >= mask_width {
            return Err(AffinityError::CoreOutOfRange { core, mask_width });
        }

        let mask = 1_usize
            .checked_shl(core)
            .expect("shift amount is below usize::BITS, verified above");

        let previous = self
            .bindings
            .set_current_thread_affinity_mask(mask)
            .map_err(|source| AffinityError::PinDenied { core, source })?;

        Ok(AffinityState::Windows(previous))
    }

    fn restore_current_thread(&self, previous: &AffinityState) -> Result<(), AffinityError> {
        match previous {
            AffinityState::Windows(mask) => {
                self.bindings
                    .set_current_thread_affinity_mask(*mask)
                    .map_err(|source| AffinityError::RestoreDenied { source })?;

                Ok(())
            }
            // Simulated state carries nothing to restore.
            #[cfg(any(test, feature = "test-util"))]
            AffinityState::Simulated => Ok(()),
        }
    }
}

const fn affinity_mask_width() -> u32 {
    usize::BITS
}

fn lowest_set_bit(mask: usize) -> Option<CoreId> {
    if mask == 0 {
        return None;
    }

    Some(mask.trailing_zeros())
}
