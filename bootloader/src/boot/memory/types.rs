// Physical layout constants and plan types

use core::fmt;

use linboot_core::{PhysAddr, VirtAddr, PAGE_SIZE};

/// Tags are placed at RAM start + 256.
pub const PHYSOFFSET_TAGS: u32 = 0x100;
/// Kernel is placed at RAM start + 32K.
pub const PHYSOFFSET_KERNEL: u32 = 0x8000;
/// Initrd is placed 5MB after the kernel.
pub const PHYSOFFSET_INITRD: u32 = PHYSOFFSET_KERNEL + 0x50_0000;
/// Room for the encoded tag list. The whole tag page is copied to
/// `PHYSOFFSET_TAGS`, which must stay below the kernel.
pub const TAG_SIZE: usize = PAGE_SIZE - 0x100;

/// One index page of 32-bit physical addresses bounds each image.
pub const MAX_IMAGE_PAGES: usize = PAGE_SIZE / core::mem::size_of::<u32>();

/// Tag, kernel index, initrd index, stack, data and preloader pages.
pub const EXTRA_PAGES: usize = 6;

/// A scratch page and where it really lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    pub virt: VirtAddr,
    pub phys: PhysAddr,
}

/// What a plan page is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRole {
    Tags,
    Kernel,
    Initrd,
    KernelIndex,
    InitrdIndex,
    Stack,
    Data,
    Preload,
}

impl PageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageRole::Tags => "tags",
            PageRole::Kernel => "kernel",
            PageRole::Initrd => "initrd",
            PageRole::KernelIndex => "kernel index",
            PageRole::InitrdIndex => "initrd index",
            PageRole::Stack => "stack",
            PageRole::Data => "data",
            PageRole::Preload => "preload",
        }
    }

    /// Lowest physical address a page of this role may occupy, relative to
    /// RAM start. Roles the preloader never copies are unconstrained.
    pub fn reserved_offset(&self) -> Option<u32> {
        match self {
            PageRole::Tags => Some(PHYSOFFSET_TAGS),
            PageRole::Kernel => Some(PHYSOFFSET_KERNEL),
            PageRole::Initrd => Some(PHYSOFFSET_INITRD),
            _ => None,
        }
    }
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image whose pages a loader fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Kernel,
    Initrd,
}

/// Physical addresses of every page of a plan, plus where the preloader
/// will put things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLayout {
    pub ram_start: PhysAddr,
    pub tags: PhysAddr,
    pub kernel: alloc::vec::Vec<PhysAddr>,
    pub initrd: alloc::vec::Vec<PhysAddr>,
    pub kernel_index: PhysAddr,
    pub initrd_index: PhysAddr,
    pub stack: PhysAddr,
    pub data: PhysAddr,
    pub preload: PhysAddr,
}

impl PlanLayout {
    pub fn tags_destination(&self) -> PhysAddr {
        self.ram_start.offset(PHYSOFFSET_TAGS)
    }

    pub fn kernel_destination(&self) -> PhysAddr {
        self.ram_start.offset(PHYSOFFSET_KERNEL)
    }

    pub fn initrd_destination(&self) -> PhysAddr {
        self.ram_start.offset(PHYSOFFSET_INITRD)
    }

    /// Physical addresses of all pages with the given role.
    pub fn pages(&self, role: PageRole) -> &[PhysAddr] {
        match role {
            PageRole::Tags => core::slice::from_ref(&self.tags),
            PageRole::Kernel => &self.kernel,
            PageRole::Initrd => &self.initrd,
            PageRole::KernelIndex => core::slice::from_ref(&self.kernel_index),
            PageRole::InitrdIndex => core::slice::from_ref(&self.initrd_index),
            PageRole::Stack => core::slice::from_ref(&self.stack),
            PageRole::Data => core::slice::from_ref(&self.data),
            PageRole::Preload => core::slice::from_ref(&self.preload),
        }
    }
}
