//! linboot Core Library
//!
//! Shared building blocks for the ARM Linux loader: typed physical and
//! virtual addresses, the in-memory log backend, and the boot variable
//! table. Designed to be no_std compatible.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod addr;
pub mod config;
pub mod logger;

pub use addr::{PhysAddr, VirtAddr, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE, SECTION_MASK, SECTION_SIZE};
pub use config::{BootConfig, ConfigError, VarKind, VarInfo, VARIABLES};
