// Boot module - prepares physically contiguous memory and launches Linux

pub mod atags;
pub mod error;
pub mod handoff;
pub mod kernel_loader;
pub mod launch;
pub mod memory;
pub mod platform;
pub mod preloader;
pub mod progress;
pub mod resume;
pub mod session;

// Architecture-specific boot code
pub mod arch;

pub use error::{BootError, BootResult};
pub use handoff::{setup_trampoline, HandoffRecord, Trampoline};
pub use kernel_loader::{
    copy_into, load_from_memory, load_from_store, ImageStore, ImageStream, OpenedImages,
    RamImage, SliceStream,
};
#[cfg(feature = "std")]
pub use kernel_loader::FsImageStore;
pub use launch::{LaunchMode, LaunchState, Launcher};
pub use memory::{
    ArenaScratch, BootPlan, GlobalScratch, ImageKind, LoadedPlan, PageRole, PlanBuilder,
    PlanLayout, ScratchAllocator,
};
pub use platform::{Framebuffer, Platform};
pub use preloader::{PreloadData, PreloadPackage};
pub use progress::{LogProgress, NoProgress, Progress};
pub use session::{command_mode, find_command, BootSession, CommandInfo, COMMANDS};
