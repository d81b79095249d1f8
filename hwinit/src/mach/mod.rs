//! Device family implementations of [`Machine`](crate::platform::Machine).

mod msm;
mod s3c;

pub use msm::{Msm7xxx, Msm7xxxA, Qsd8xxx};
pub use s3c::Rx3715;

use linboot_core::PhysAddr;

use crate::cpu::cache::CacheFlavor;
use crate::platform::{Machine, PlatformId};

/// Fallback for unrecognized devices. The machine type must come from the
/// `MTYPE` variable.
pub struct GenericArm;

impl Machine for GenericArm {
    fn name(&self) -> &'static str {
        "Generic ARM"
    }

    fn machine_type(&self) -> u32 {
        0
    }

    fn ram_base(&self) -> PhysAddr {
        PhysAddr::new(0xa000_0000)
    }

    fn default_ram_size(&self) -> u32 {
        64 * 1024 * 1024
    }

    fn cache_flavor(&self) -> CacheFlavor {
        CacheFlavor::Arm4
    }

    fn detect(&self, _id: &PlatformId<'_>) -> bool {
        true
    }
}
