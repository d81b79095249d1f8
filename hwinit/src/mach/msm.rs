// Qualcomm MSM7xxx / QSD8xxx families.
//
// None of these has a single Linux machine number; the user sets MTYPE.

use linboot_core::PhysAddr;

use crate::cpu::cache::CacheFlavor;
use crate::platform::{Machine, PlatformId};

const MSM_RAM_BASE: u32 = 0x1000_0000;
const QSD_RAM_BASE: u32 = 0x1880_0000;

fn cpu_is_one_of(id: &PlatformId<'_>, names: &[&str]) -> bool {
    names.iter().any(|n| id.cpu.eq_ignore_ascii_case(n))
}

pub struct Msm7xxxA;

impl Machine for Msm7xxxA {
    fn name(&self) -> &'static str {
        "Generic MSM7xxxA"
    }

    fn machine_type(&self) -> u32 {
        0
    }

    fn ram_base(&self) -> PhysAddr {
        PhysAddr::new(MSM_RAM_BASE)
    }

    fn default_ram_size(&self) -> u32 {
        128 * 1024 * 1024
    }

    fn cache_flavor(&self) -> CacheFlavor {
        CacheFlavor::Arm6
    }

    fn detect(&self, id: &PlatformId<'_>) -> bool {
        cpu_is_one_of(id, &["MSM7201A"])
    }
}

pub struct Msm7xxx;

impl Machine for Msm7xxx {
    fn name(&self) -> &'static str {
        "Generic MSM7xxx"
    }

    fn machine_type(&self) -> u32 {
        0
    }

    fn ram_base(&self) -> PhysAddr {
        PhysAddr::new(MSM_RAM_BASE)
    }

    fn default_ram_size(&self) -> u32 {
        128 * 1024 * 1024
    }

    fn cache_flavor(&self) -> CacheFlavor {
        CacheFlavor::Arm6
    }

    fn detect(&self, id: &PlatformId<'_>) -> bool {
        cpu_is_one_of(id, &["MSM7500", "MSM7200"])
    }
}

pub struct Qsd8xxx;

impl Machine for Qsd8xxx {
    fn name(&self) -> &'static str {
        "Generic QSD8xxx"
    }

    fn machine_type(&self) -> u32 {
        0
    }

    fn ram_base(&self) -> PhysAddr {
        PhysAddr::new(QSD_RAM_BASE)
    }

    fn default_ram_size(&self) -> u32 {
        256 * 1024 * 1024
    }

    fn cache_flavor(&self) -> CacheFlavor {
        CacheFlavor::Arm7
    }

    fn detect(&self, id: &PlatformId<'_>) -> bool {
        // QSD8250B: HTC Leo, QSD8250: Acer S200
        cpu_is_one_of(id, &["QSD8250B", "QSD8250"])
    }
}
