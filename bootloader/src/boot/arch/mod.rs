//! Architecture-specific boot code
//!
//! ARM only: the stack-jumper handler that enters the preloader with the
//! MMU off, and the linker symbols bounding the preloader section.

#[cfg(target_arch = "arm")]
pub mod arm;

#[cfg(target_arch = "arm")]
pub use arm::linked_package;
