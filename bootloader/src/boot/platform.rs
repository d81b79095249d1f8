// Collaborators a boot attempt runs against

use linboot_core::{PhysAddr, VirtAddr};
use linboot_hwinit::{AddressSpace, Clock, Cpu, Machine};

/// Host framebuffer used for progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framebuffer {
    /// Loader-side pointer, drawn to while the MMU is on
    pub virt: VirtAddr,
    /// Bus address, handed to the preloader
    pub phys: PhysAddr,
}

#[derive(Clone, Copy)]
pub struct Platform<'a> {
    pub space: &'a dyn AddressSpace,
    pub cpu: &'a dyn Cpu,
    pub machine: &'a dyn Machine,
    pub clock: &'a dyn Clock,
    pub framebuffer: Option<Framebuffer>,
}

impl<'a> Platform<'a> {
    pub fn new(
        space: &'a dyn AddressSpace,
        cpu: &'a dyn Cpu,
        machine: &'a dyn Machine,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            space,
            cpu,
            machine,
            clock,
            framebuffer: None,
        }
    }

    pub fn with_framebuffer(mut self, framebuffer: Framebuffer) -> Self {
        self.framebuffer = Some(framebuffer);
        self
    }

    /// Framebuffer for boot progress lines, if the machine keeps it
    /// scanned out while booting.
    pub fn boot_framebuffer(&self) -> Option<Framebuffer> {
        self.framebuffer
            .filter(|_| self.machine.framebuffer_active_during_boot())
    }

    pub fn boot_video_ram(&self) -> Option<PhysAddr> {
        self.boot_framebuffer().map(|fb| fb.phys)
    }
}
