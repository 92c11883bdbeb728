use std::mem;

use foldhash::{HashSet, HashSetExt};
use libc::{CPU_SET, CPU_SETSIZE, cpu_set_t};

use crate::pal::linux::{Bindings, BindingsFacade, Filesystem, FilesystemFacade};
use crate::pal::{AffinityState, Platform};
use crate::{AffinityError, CoreId, PlatformError};

/// The platform that matches the target platform of the current build.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    bindings: BindingsFacade,
    filesystem: FilesystemFacade,
}

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform =
    BuildTargetPlatform::new(BindingsFacade::target(), FilesystemFacade::target());

/// Identifies the physical core a logical CPU belongs to, for deduplication.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum CoreIdentity {
    /// The kernel exposed topology data for the CPU. Some platforms report `-1` for
    /// either field; that still forms a usable grouping key.
    Known { package: i64, core: i64 },

    /// The kernel exposed no topology data, so the CPU counts as its own core.
    Standalone(CoreId),
}

impl BuildTargetPlatform {
    pub(crate) const fn new(bindings: BindingsFacade, filesystem: FilesystemFacade) -> Self {
        Self {
            bindings,
            filesystem,
        }
    }

    fn core_identity(&self, cpu: CoreId) -> Result<CoreIdentity, PlatformError> {
        let core_contents = self.filesystem.get_cpu_core_id_contents(cpu);
        let package_contents = self.filesystem.get_cpu_package_id_contents(cpu);

        match (core_contents, package_contents) {
            (Some(core), Some(package)) => Ok(CoreIdentity::Known {
                package: parse_topology_value(&package)?,
                core: parse_topology_value(&core)?,
            }),
            // Kernels without the topology subtree get one "core" per logical CPU.
            _ => Ok(CoreIdentity::Standalone(cpu)),
        }
    }
}

impl Platform for BuildTargetPlatform {
    fn physical_core_representatives(&self) -> Result<Vec<CoreId>, PlatformError> {
        let online = self
            .filesystem
            .get_online_cpus_contents()
            .map_err(|source| PlatformError::QueryFailed { source })?;
        let online = online.trim();

        let online_cpus = cpulist::parse(online).map_err(|error| PlatformError::MalformedData {
            invalid_value: online.to_string(),
            problem: error.to_string(),
        })?;

        let mut seen = HashSet::new();
        let mut representatives = Vec::new();

        // The parsed list is ascending, so the first CPU seen for a physical core is
        // its lowest logical CPU ID and the result stays sorted.
        for cpu in online_cpus {
            if seen.insert(self.core_identity(cpu)?) {
                representatives.push(cpu);
            }
        }

        if representatives.is_empty() {
            return Err(PlatformError::NoProcessors);
        }

        Ok(representatives)
    }

    fn pin_current_thread(&self, core: CoreId) -> Result<AffinityState, AffinityError> {
        let mask_width = affinity_mask_width();

        if core >= mask_width {
            return Err(AffinityError::CoreOutOfRange { core, mask_width });
        }

        let previous = self
            .bindings
            .sched_getaffinity_current()
            .map_err(|source| AffinityError::PinDenied { core, source })?;

        // SAFETY: An all-zero bit pattern is a valid (empty) cpu_set_t.
        let mut cpuset: cpu_set_t = unsafe { mem::zeroed() };

        let core_index =
            usize::try_from(core).expect("u32 always fits in usize on supported platforms");
        // SAFETY: `core_index` is below the mask width, checked above.
        unsafe {
            CPU_SET(core_index, &mut cpuset);
        }

        self.bindings
            .sched_setaffinity_current(&cpuset)
            .map_err(|source| AffinityError::PinDenied { core, source })?;

        Ok(AffinityState::Linux(Box::new(previous)))
    }

    fn restore_current_thread(&self, previous: &AffinityState) -> Result<(), AffinityError> {
        match previous {
            AffinityState::Linux(cpuset) => self
                .bindings
                .sched_setaffinity_current(cpuset)
                .map_err(|source| AffinityError::RestoreDenied { source }),
            // Simulated state carries nothing to restore.
            #[cfg(any(test, feature = "test-util"))]
            AffinityState::Simulated => Ok(()),
        }
    }
}

fn affinity_mask_width() -> u32 {
    u32::try_from(CPU_SETSIZE).expect("CPU_SETSIZE is a small positive constant")
}

fn parse_topology_value(contents: &str) -> Result<i64, PlatformError> {
    let trimmed = contents.trim();

    trimmed
        .parse::<i64>()
        .map_err(|error| PlatformError::MalformedData {
            invalid_value: trimmed.to_string(),
            problem: error.to_string(),
        })
}
