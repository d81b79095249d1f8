// Samsung S3C24xx based devices.

use linboot_core::PhysAddr;

use crate::cpu::cache::CacheFlavor;
use crate::platform::{starts_with_ignore_case, Machine, PlatformId};

/// SDRAM bank 6 (nGCS6).
const S3C24XX_RAM_BASE: u32 = 0x3000_0000;

const MACH_TYPE_RX3715: u32 = 1100;

/// HP iPAQ rx3715 (S3C2442).
pub struct Rx3715;

impl Machine for Rx3715 {
    fn name(&self) -> &'static str {
        "RX3715"
    }

    fn machine_type(&self) -> u32 {
        MACH_TYPE_RX3715
    }

    fn ram_base(&self) -> PhysAddr {
        PhysAddr::new(S3C24XX_RAM_BASE)
    }

    fn default_ram_size(&self) -> u32 {
        64 * 1024 * 1024
    }

    fn cache_flavor(&self) -> CacheFlavor {
        CacheFlavor::Arm4
    }

    fn framebuffer_active_during_boot(&self) -> bool {
        false
    }

    fn detect(&self, id: &PlatformId<'_>) -> bool {
        starts_with_ignore_case(id.oem, "HP iPAQ rx3700")
    }
}
