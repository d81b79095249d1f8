//! linboot Bootloader
//!
//! Boots a Linux/ARM kernel from inside a running host OS. The host owns
//! the MMU and hands out scattered pages, so booting happens in two
//! halves:
//!
//! ```text
//! MMU on (this crate, host process)        MMU off (preloader page)
//! ─────────────────────────────────        ─────────────────────────
//! 1. allocate + sort scratch pages
//! 2. load kernel/initrd into them
//! 3. write tags, index pages, handoff
//! 4. shut hardware down, trampoline ───▶  5. copy tags/kernel/initrd
//!                                          6. jump to RAM + 0x8000
//! ```
//!
//! Everything up to the trampoline can fail cleanly and is reported as a
//! [`BootError`]. The `std` feature adds a filesystem image store.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod boot;

pub use boot::*;
