//! Stack jumper and preloader section bounds
//!
//! The MMU trampoline branches to the jumper's handler at its physical
//! address. The handler picks up three words stored just before it:
//!
//! ```text
//!   linboot_stack_jumper:
//!     +0  .word stack        <- ldr sp, [pc, #-20]   (pc = +20)
//!     +4  .word data         <- ldr r0, [pc, #-20]   (pc = +24)
//!     +8  .word exec_code    <- ldr pc, [pc, #-20]   (pc = +28)
//!     +12 handler
//! ```
//!
//! `ldr pc` interworks, so a Thumb preloader entry keeps its low bit.

use crate::boot::preloader::{linboot_preloader, PreloadPackage};

core::arch::global_asm!(
    ".section linboot_preload, \"ax\", %progbits",
    ".arm",
    ".balign 4",
    ".global linboot_stack_jumper",
    "linboot_stack_jumper:",
    "    .word 0",
    "    .word 0",
    "    .word 0",
    "    ldr sp, [pc, #-20]",
    "    ldr r0, [pc, #-20]",
    "    ldr pc, [pc, #-20]",
    ".text",
);

extern "C" {
    // Defined by the linker for any section with a C-identifier name
    static __start_linboot_preload: u8;
    static __stop_linboot_preload: u8;
    static linboot_stack_jumper: u8;
}

/// The preloader as linked into this image.
pub fn linked_package() -> PreloadPackage<'static> {
    // SAFETY: the section bounds come from the linker and the section is
    // read-only code for the lifetime of the image.
    unsafe {
        let start = core::ptr::addr_of!(__start_linboot_preload);
        let stop = core::ptr::addr_of!(__stop_linboot_preload);
        let len = (stop as usize).wrapping_sub(start as usize);
        let code = core::slice::from_raw_parts(start, len);

        let entry = (linboot_preloader as usize).wrapping_sub(start as usize);
        let handoff = (core::ptr::addr_of!(linboot_stack_jumper) as usize).wrapping_sub(start as usize);
        PreloadPackage::new(code, entry, handoff)
    }
}
