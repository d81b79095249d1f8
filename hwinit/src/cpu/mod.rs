//! CPU Management
//!
//! The few CPU operations the launch path needs, behind the [`Cpu`] trait so
//! that the launch sequencing can run against a recording fake on a
//! development host.
//!
//! # Modules
//!
//! - `arm` - ARM implementation (interrupt masking, CP15 access, MMU trampoline)
//! - `cache` - Cache clean/invalidate routines per core generation

#[cfg(target_arch = "arm")]
pub mod arm;
pub mod cache;

#[cfg(target_arch = "arm")]
pub use arm::ArmCpu;

use linboot_core::{PhysAddr, VirtAddr};

/// Address range of a piece of code, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRange {
    pub start: VirtAddr,
    pub end: VirtAddr,
}

impl CodeRange {
    pub const fn new(start: VirtAddr, end: VirtAddr) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.as_usize() - self.start.as_usize()
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Cpu {
    /// Mask IRQ and FIQ. Returns whether they were enabled before.
    fn disable_interrupts(&self) -> bool;

    fn enable_interrupts(&self);

    /// Physical base of the active first-level translation table.
    fn translation_table(&self) -> PhysAddr;

    /// Fault in every page of the launch code so nothing is demand-paged
    /// once interrupts are off.
    fn touch_app_pages(&self) {}

    /// The MMU-disable routine, as linked into the running image.
    fn trampoline_routine(&self) -> CodeRange;

    /// Identity-map the trampoline's section, disable the MMU, and branch to
    /// `entry`.
    ///
    /// # Safety
    /// Interrupts must be disabled, `phys_trampoline` must be the physical
    /// address of [`trampoline_routine`](Self::trampoline_routine), and
    /// `table` must be the writable mapping of the first-level table.
    /// Only returns if the hardware refused the transition.
    unsafe fn mmu_trampoline(&self, phys_trampoline: PhysAddr, table: VirtAddr, entry: PhysAddr);
}
