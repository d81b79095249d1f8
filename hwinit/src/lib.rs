//! Hardware Layer
//!
//! Everything the loader needs from the machine it runs on, kept behind
//! small traits so the boot logic can be exercised on a development host.
//!
//! # Architecture
//!
//! ```text
//! Host environment provides:
//!   - A virtual mapping of its own (MMU on)
//!   - Identification strings (CPU name, OEM string)
//!
//! This crate provides:
//!   - AddressSpace    virt <-> phys translation, RAM bank
//!   - Cpu             interrupt masking, TTB, MMU trampoline
//!   - Machine         per-family cache flush and shutdown hooks
//!   - Clock           blocking delays
//! ```
//!
//! # Machine Registry
//!
//! ```ignore
//! use linboot_hwinit::{init_machine, PlatformId};
//!
//! let machine = init_machine(&PlatformId { cpu: "MSM7201A", oem: "HTC Vogue" });
//! machine.flush_cache();
//! ```
//!
//! # What This Crate Does NOT Do
//!
//! - Device register programming beyond cache maintenance
//! - Memory layout decisions for the kernel (see linboot-bootloader)

#![cfg_attr(not(test), no_std)]

pub mod cpu;
pub mod mach;
pub mod memory;
pub mod platform;
pub mod sync;
pub mod timer;

// ═══════════════════════════════════════════════════════════════════════════
// CPU RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════

pub use cpu::cache::{flush_cache_arm4, flush_cache_arm6, flush_cache_arm7, CacheFlavor};
pub use cpu::{CodeRange, Cpu};
#[cfg(target_arch = "arm")]
pub use cpu::ArmCpu;

// ═══════════════════════════════════════════════════════════════════════════
// MEMORY RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════

pub use memory::{pages_for, AddressSpace, RamRegion, TableWalker, Window};

// ═══════════════════════════════════════════════════════════════════════════
// PLATFORM RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════

pub use platform::{
    detect_machine, init_machine, machine, Machine, PlatformId, ShutdownError, MACHINES,
};

pub use sync::{without_interrupts, ControlGuard};
pub use timer::Clock;
