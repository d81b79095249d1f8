//! ARM CPU primitives.
//!
//! # The MMU trampoline
//!
//! ```text
//!   r0 = physical address of linboot_mmu_trampoline
//!   r1 = virtual address of the first-level table
//!   r2 = physical address to branch to
//!
//!   1. write a 1MB identity section for r0's section into the table
//!   2. drain write buffer, invalidate TLB
//!   3. jump to the identity-mapped copy of the next instruction
//!   4. clear SCTLR.{M,C,I}
//!   5. mov pc, r2
//! ```
//!
//! Step 1 replaces whatever mapped that MB before, which is why the caller
//! must check the routine's own virtual range does not fall inside it. The
//! routine must not straddle a page for the physical jump in step 3 to be
//! valid.

use core::arch::{asm, global_asm};

use linboot_core::{PhysAddr, VirtAddr, PAGE_SIZE};

use super::{CodeRange, Cpu};

global_asm!(
    ".section .text.linboot_trampoline, \"ax\", %progbits",
    ".arm",
    ".balign 64",
    ".global linboot_mmu_trampoline",
    ".type linboot_mmu_trampoline, %function",
    "linboot_mmu_trampoline:",
    // Identity section: AP=11, uncached
    "lsr r3, r0, #20",
    "lsl r4, r3, #20",
    "orr r4, r4, #0xc00",
    "orr r4, r4, #0x002",
    "str r4, [r1, r3, lsl #2]",
    "mov r3, #0",
    "mcr p15, 0, r3, c7, c10, 4",
    "mcr p15, 0, r3, c8, c7, 0",
    "add r3, r0, #(2f - linboot_mmu_trampoline)",
    "mov pc, r3",
    "2:",
    "mrc p15, 0, r3, c1, c0, 0",
    "bic r3, r3, #0x0005",
    "bic r3, r3, #0x1000",
    "mcr p15, 0, r3, c1, c0, 0",
    "nop",
    "nop",
    "nop",
    "mov r3, #0",
    "mcr p15, 0, r3, c7, c5, 0",
    "mcr p15, 0, r3, c8, c7, 0",
    "mov pc, r2",
    ".global linboot_mmu_trampoline_end",
    "linboot_mmu_trampoline_end:",
    ".previous",
);

extern "C" {
    fn linboot_mmu_trampoline(phys_trampoline: u32, table: u32, entry: u32);
    static linboot_mmu_trampoline_end: u8;
}

const CPSR_IRQ_FIQ: u32 = 0xc0;
const TTB_MASK: u32 = 0xffff_c000;

/// The running ARM core.
pub struct ArmCpu;

impl ArmCpu {
    pub const fn new() -> Self {
        Self
    }

    fn touch(range: &CodeRange) {
        let mut page = range.start.page_align_down();
        while page < range.end {
            // SAFETY: the range is mapped code of this image.
            unsafe { core::ptr::read_volatile(page.as_ptr::<u8>()) };
            page = page.offset(PAGE_SIZE);
        }
    }
}

impl Cpu for ArmCpu {
    fn disable_interrupts(&self) -> bool {
        let cpsr: u32;
        unsafe {
            asm!(
                "mrs {old}, cpsr",
                "orr {tmp}, {old}, #0xc0",
                "msr cpsr_c, {tmp}",
                old = out(reg) cpsr,
                tmp = out(reg) _,
                options(nostack),
            );
        }
        cpsr & CPSR_IRQ_FIQ != CPSR_IRQ_FIQ
    }

    fn enable_interrupts(&self) {
        unsafe {
            asm!(
                "mrs {tmp}, cpsr",
                "bic {tmp}, {tmp}, #0xc0",
                "msr cpsr_c, {tmp}",
                tmp = out(reg) _,
                options(nostack),
            );
        }
    }

    fn translation_table(&self) -> PhysAddr {
        let ttb: u32;
        unsafe { asm!("mrc p15, 0, {0}, c2, c0, 0", out(reg) ttb, options(nomem, nostack)) };
        PhysAddr::new(ttb & TTB_MASK)
    }

    fn touch_app_pages(&self) {
        Self::touch(&self.trampoline_routine());
    }

    fn trampoline_routine(&self) -> CodeRange {
        let start = linboot_mmu_trampoline as usize;
        // SAFETY: only the symbol's address is taken.
        let end = unsafe { core::ptr::addr_of!(linboot_mmu_trampoline_end) as usize };
        CodeRange::new(VirtAddr::new(start), VirtAddr::new(end))
    }

    unsafe fn mmu_trampoline(&self, phys_trampoline: PhysAddr, table: VirtAddr, entry: PhysAddr) {
        linboot_mmu_trampoline(phys_trampoline.as_u32(), table.as_usize() as u32, entry.as_u32());
    }
}
