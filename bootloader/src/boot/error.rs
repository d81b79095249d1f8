// Boot error types

use alloc::string::String;
use core::fmt;

use linboot_core::{PhysAddr, VirtAddr};
use linboot_hwinit::ShutdownError;

use super::memory::PageRole;

/// Why a boot attempt stopped.
///
/// Everything except [`TrampolineDidNotReturnControl`](Self::TrampolineDidNotReturnControl)
/// and [`SessionPoisoned`](Self::SessionPoisoned) is raised before interrupts
/// are disabled: the plan is dropped, its memory released, and the system
/// is untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    /// Scratch memory for the plan could not be allocated
    AllocationFailure { pages: usize },
    /// A scratch page has no physical backing
    UnmappedPage { virt: VirtAddr },
    /// Image needs more pages than one index page can describe
    ImageTooLarge { pages: usize, max_pages: usize },
    /// Neither MTYPE nor the machine supplies a machine number
    UndefinedMachineType,
    /// A page sits below the relocation destination of its role
    UnsafeMemoryLayout {
        role: PageRole,
        expected_min: PhysAddr,
        actual: PhysAddr,
    },
    /// Boot tags do not fit in the tag area
    TagEncodingTooLarge { needed: usize, available: usize },
    /// Kernel command line contains a NUL byte
    InvalidCmdline { nul_at: usize },
    /// Preloader blob is malformed
    InvalidPreloadPackage { reason: &'static str },
    /// Kernel image could not be opened
    OpenFailed { name: String },
    /// Image source delivered fewer bytes than announced
    ReadError { expected: usize, got: usize },
    /// In-memory image buffer shorter than its declared size, or not the
    /// size its plan was prepared for
    SourceTooShort { declared: usize, available: usize },
    /// MMU trampoline crosses a page boundary
    SpansPageBoundary { start: VirtAddr, end: VirtAddr },
    /// MMU trampoline has no physical address
    NotInPhysicalRam { virt: VirtAddr },
    /// Identity section of the trampoline would replace its own mapping
    OverlappingMapping { virt: VirtAddr, phys: PhysAddr },
    /// First-level translation table cannot be mapped
    TranslationTableUnmapped { phys: PhysAddr },
    /// Machine refused to prepare for shutdown
    PreShutdownFailed(ShutdownError),
    /// Resume vector address cannot be mapped
    ResumeVectorUnmapped { phys: PhysAddr },
    /// Resume vector does not hold the expected branch
    UnexpectedResumeVector { found: [u32; 2] },
    /// No suspend/resume cycle happened; vector restored
    ResumeTimedOut,
    /// MMU trampoline came back; device state is unknown
    TrampolineDidNotReturnControl,
    /// An earlier attempt left the device in an unknown state
    SessionPoisoned,
}

impl BootError {
    /// No further boot attempt should be made in this session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BootError::TrampolineDidNotReturnControl | BootError::SessionPoisoned
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BootError::AllocationFailure { .. } => "Failed to allocate boot memory",
            BootError::UnmappedPage { .. } => "Page not mapped",
            BootError::ImageTooLarge { .. } => "Image too large",
            BootError::UndefinedMachineType => "Undefined MTYPE",
            BootError::UnsafeMemoryLayout { .. } => "Allocated memory will overwrite itself",
            BootError::TagEncodingTooLarge { .. } => "Boot tags too large",
            BootError::InvalidCmdline { .. } => "NUL byte in kernel command line",
            BootError::InvalidPreloadPackage { .. } => "Invalid preloader package",
            BootError::OpenFailed { .. } => "Failed to open file",
            BootError::ReadError { .. } => "Error reading image",
            BootError::SourceTooShort { .. } => "Image buffer too short",
            BootError::SpansPageBoundary { .. } => "Trampoline spans page boundary",
            BootError::NotInPhysicalRam { .. } => "Trampoline not in physical RAM",
            BootError::OverlappingMapping { .. } => "Trampoline physical/virtual addresses overlap",
            BootError::TranslationTableUnmapped { .. } => "Translation table not mapped",
            BootError::PreShutdownFailed(_) => "Pre-shutdown failed",
            BootError::ResumeVectorUnmapped { .. } => "Could not map resume vector",
            BootError::UnexpectedResumeVector { .. } => "Unexpected resume vector",
            BootError::ResumeTimedOut => "Timed out waiting for suspend/resume",
            BootError::TrampolineDidNotReturnControl => "Trampoline returned",
            BootError::SessionPoisoned => "Boot session unusable after failed launch",
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = self.as_str();
        match self {
            BootError::AllocationFailure { pages } => write!(f, "{} ({} pages)", msg, pages),
            BootError::UnmappedPage { virt } => write!(f, "{} at {}", msg, virt),
            BootError::ImageTooLarge { pages, max_pages } => {
                write!(f, "{}: {} pages, largest is {}", msg, pages, max_pages)
            }
            BootError::UnsafeMemoryLayout {
                role,
                expected_min,
                actual,
            } => write!(
                f,
                "{}: {} page at {}, must be at or above {}",
                msg, role, actual, expected_min
            ),
            BootError::TagEncodingTooLarge { needed, available } => {
                write!(f, "{}: {} bytes, {} available", msg, needed, available)
            }
            BootError::InvalidCmdline { nul_at } => write!(f, "{} at offset {}", msg, nul_at),
            BootError::InvalidPreloadPackage { reason } => write!(f, "{}: {}", msg, reason),
            BootError::OpenFailed { name } => write!(f, "{} {}", msg, name),
            BootError::ReadError { expected, got } => {
                write!(f, "{}. Expected {} got {}", msg, expected, got)
            }
            BootError::SourceTooShort {
                declared,
                available,
            } => write!(f, "{}: declared {} bytes, {} available", msg, declared, available),
            BootError::SpansPageBoundary { start, end } => {
                write!(f, "{} ({} {})", msg, start, end)
            }
            BootError::NotInPhysicalRam { virt } => write!(f, "{} (virt={})", msg, virt),
            BootError::OverlappingMapping { virt, phys } => {
                write!(f, "{} (virt={} phys={})", msg, virt, phys)
            }
            BootError::TranslationTableUnmapped { phys } => write!(f, "{} ({})", msg, phys),
            BootError::PreShutdownFailed(err) => write!(f, "{}: {}", msg, err),
            BootError::ResumeVectorUnmapped { phys } => write!(f, "{} {}", msg, phys),
            BootError::UnexpectedResumeVector { found } => {
                write!(f, "{} ({:08x} {:08x})", msg, found[0], found[1])
            }
            _ => f.write_str(msg),
        }
    }
}

impl From<ShutdownError> for BootError {
    fn from(err: ShutdownError) -> Self {
        BootError::PreShutdownFailed(err)
    }
}

pub type BootResult<T> = Result<T, BootError>;
