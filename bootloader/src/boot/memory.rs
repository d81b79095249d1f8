//! Boot memory plan
//!
//! The kernel wants to run from physically contiguous RAM at a fixed
//! offset, but all we can get from the host is a scattered set of pages.
//! The plan allocates enough scratch pages, sorts them by physical
//! address and hands each one a role:
//!
//! ```text
//!  sorted slot:  0     1 .. k     k+1 .. k+i    total-5 .. total-1
//!               ┌────┬─────────┬─────────────┬──────┬──────┬─────┬────┬─────────┐
//!               │tags│ kernel  │   initrd    │k-idx │i-idx │stack│data│preloader│
//!               └────┴─────────┴─────────────┴──────┴──────┴─────┴────┴─────────┘
//! ```
//!
//! The preloader later copies tags, kernel and initrd down to their final
//! homes. A source page that sits below its own destination could be
//! overwritten before it is copied, so every page of those three roles is
//! checked against `RAM + offset`. The ordering above makes the check
//! usually pass; the check is what makes the plan safe.

mod allocation;
mod locator;
mod types;

use alloc::vec::Vec;
use core::ops::{Deref, Range};

use linboot_core::{PhysAddr, PAGE_SIZE};
use linboot_hwinit::pages_for;

pub use allocation::{ArenaScratch, GlobalScratch, ScratchAllocator, ScratchBlock};
pub use locator::{locate_pages, sort_by_phys};
pub use types::{
    ImageKind, PageDescriptor, PageRole, PlanLayout, EXTRA_PAGES, MAX_IMAGE_PAGES,
    PHYSOFFSET_INITRD, PHYSOFFSET_KERNEL, PHYSOFFSET_TAGS, TAG_SIZE,
};

use super::atags;
use super::error::{BootError, BootResult};
use super::handoff::HandoffRecord;
use super::platform::Platform;
use super::preloader::{PreloadData, PreloadPackage};

/// Every role, in slot order.
pub const ROLES: [PageRole; 8] = [
    PageRole::Tags,
    PageRole::Kernel,
    PageRole::Initrd,
    PageRole::KernelIndex,
    PageRole::InitrdIndex,
    PageRole::Stack,
    PageRole::Data,
    PageRole::Preload,
];

/// Sorted slots holding pages of `role`.
pub fn role_slots(role: PageRole, kernel_pages: usize, initrd_pages: usize) -> Range<usize> {
    let total = kernel_pages + initrd_pages + EXTRA_PAGES;
    let images = 1 + kernel_pages;
    match role {
        PageRole::Tags => 0..1,
        PageRole::Kernel => 1..images,
        PageRole::Initrd => images..images + initrd_pages,
        PageRole::KernelIndex => total - 5..total - 4,
        PageRole::InitrdIndex => total - 4..total - 3,
        PageRole::Stack => total - 3..total - 2,
        PageRole::Data => total - 2..total - 1,
        PageRole::Preload => total - 1..total,
    }
}

/// Check that no page the preloader copies lies below its destination.
pub fn validate_layout(layout: &PlanLayout) -> BootResult<()> {
    for role in ROLES {
        let Some(offset) = role.reserved_offset() else {
            continue;
        };
        let expected_min = layout.ram_start.offset(offset);
        if let Some(&actual) = layout.pages(role).iter().find(|&&p| p < expected_min) {
            log::error!(
                "Allocated memory will overwrite itself ({} page {} below {})",
                role,
                actual,
                expected_min
            );
            return Err(BootError::UnsafeMemoryLayout {
                role,
                expected_min,
                actual,
            });
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Builds [`BootPlan`]s for one platform.
pub struct PlanBuilder<'a> {
    platform: Platform<'a>,
    allocator: &'a dyn ScratchAllocator,
    package: PreloadPackage<'a>,
    cmdline: &'a str,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(
        platform: Platform<'a>,
        allocator: &'a dyn ScratchAllocator,
        package: PreloadPackage<'a>,
    ) -> Self {
        Self {
            platform,
            allocator,
            package,
            cmdline: "",
        }
    }

    pub fn cmdline(mut self, cmdline: &'a str) -> Self {
        self.cmdline = cmdline;
        self
    }

    /// Allocate and lay out a plan for images of the given byte sizes.
    ///
    /// `machine_type` 0 falls back to the machine's own number. On success
    /// everything except the image pages is written; on failure the
    /// scratch memory has already been released.
    pub fn prepare(
        &self,
        kernel_size: usize,
        initrd_size: usize,
        machine_type: u32,
    ) -> BootResult<BootPlan<'a>> {
        let kernel_pages = pages_for(kernel_size);
        let initrd_pages = pages_for(initrd_size);
        for pages in [kernel_pages, initrd_pages] {
            if pages > MAX_IMAGE_PAGES {
                log::error!("Image too large ({} pages, max {})", pages, MAX_IMAGE_PAGES);
                return Err(BootError::ImageTooLarge {
                    pages,
                    max_pages: MAX_IMAGE_PAGES,
                });
            }
        }

        let machine_type = match machine_type {
            0 => self.platform.machine.machine_type(),
            mtype => mtype,
        };
        if machine_type == 0 {
            log::error!("undefined MTYPE");
            return Err(BootError::UndefinedMachineType);
        }

        self.package.validate()?;

        log::info!("boot MTYPE={} CMDLINE='{}'", machine_type, self.cmdline);

        let total = kernel_pages + initrd_pages + EXTRA_PAGES;
        // One spare page absorbs aligning the block up
        let block = ScratchBlock::new(self.allocator, total * PAGE_SIZE + PAGE_SIZE - 1, total)?;
        let mut pages = locate_pages(self.platform.space, block.base().page_align_up(), total)?;
        sort_by_phys(&mut pages);

        let ram = self.platform.space.ram();
        let slots = |role| &pages[role_slots(role, kernel_pages, initrd_pages)];
        let phys = |role| slots(role)[0].phys;
        let layout = PlanLayout {
            ram_start: ram.base,
            tags: phys(PageRole::Tags),
            kernel: slots(PageRole::Kernel).iter().map(|p| p.phys).collect(),
            initrd: slots(PageRole::Initrd).iter().map(|p| p.phys).collect(),
            kernel_index: phys(PageRole::KernelIndex),
            initrd_index: phys(PageRole::InitrdIndex),
            stack: phys(PageRole::Stack),
            data: phys(PageRole::Data),
            preload: phys(PageRole::Preload),
        };

        log::debug!(
            "Allocated {} pages (tags={} kernel={} initrd={} index={})",
            total,
            layout.tags,
            layout.kernel.first().copied().unwrap_or_default(),
            layout.initrd.first().copied().unwrap_or_default(),
            layout.kernel_index
        );

        validate_layout(&layout)?;

        let physical_entry = layout
            .preload
            .offset(self.package.handler_offset() as u32);

        let mut plan = BootPlan {
            block,
            pages,
            layout,
            kernel_size,
            initrd_size,
            machine_type,
            physical_entry,
        };

        plan.write_tags(ram.size, self.cmdline)?;
        plan.write_index(ImageKind::Kernel);
        plan.write_index(ImageKind::Initrd);
        plan.write_preload_data(self.platform.boot_video_ram());
        plan.place_package(&self.package);

        Ok(plan)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PLAN
// ═══════════════════════════════════════════════════════════════════════════

/// Scratch pages with roles assigned and all control pages written.
///
/// Owns its scratch memory; dropping the plan releases it.
pub struct BootPlan<'a> {
    block: ScratchBlock<'a>,
    pages: Vec<PageDescriptor>,
    layout: PlanLayout,
    kernel_size: usize,
    initrd_size: usize,
    machine_type: u32,
    physical_entry: PhysAddr,
}

impl<'a> BootPlan<'a> {
    /// Physical address of the stack-jumper handler inside the placed
    /// preloader page. The MMU trampoline jumps here.
    pub fn physical_entry(&self) -> PhysAddr {
        self.physical_entry
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn initrd_size(&self) -> usize {
        self.initrd_size
    }

    pub fn kernel_pages(&self) -> usize {
        self.layout.kernel.len()
    }

    pub fn initrd_pages(&self) -> usize {
        self.layout.initrd.len()
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Machine number the kernel will be entered with.
    pub fn machine_type(&self) -> u32 {
        self.machine_type
    }

    pub fn layout(&self) -> &PlanLayout {
        &self.layout
    }

    /// Pages of `role` in slot order.
    pub fn descriptors(&self, role: PageRole) -> &[PageDescriptor] {
        &self.pages[role_slots(role, self.kernel_pages(), self.initrd_pages())]
    }

    fn page(&self, desc: PageDescriptor) -> &[u8] {
        debug_assert!(self.block.contains(desc.virt, PAGE_SIZE));
        // SAFETY: every descriptor lies inside the block this plan owns.
        unsafe { core::slice::from_raw_parts(desc.virt.as_ptr::<u8>(), PAGE_SIZE) }
    }

    fn page_mut(&mut self, desc: PageDescriptor) -> &mut [u8] {
        debug_assert!(self.block.contains(desc.virt, PAGE_SIZE));
        // SAFETY: as above, and `&mut self` makes the access exclusive.
        unsafe { core::slice::from_raw_parts_mut(desc.virt.as_mut_ptr::<u8>(), PAGE_SIZE) }
    }

    fn role_page(&self, role: PageRole) -> &[u8] {
        self.page(self.descriptors(role)[0])
    }

    fn role_page_mut(&mut self, role: PageRole) -> &mut [u8] {
        let desc = self.descriptors(role)[0];
        self.page_mut(desc)
    }

    /// The encoded tag area (`TAG_SIZE` bytes, zero padded).
    pub fn tag_bytes(&self) -> &[u8] {
        &self.role_page(PageRole::Tags)[..TAG_SIZE]
    }

    pub fn preload_data(&self) -> PreloadData {
        PreloadData::read_from(self.role_page(PageRole::Data)).unwrap_or_default()
    }

    /// The placed preloader page.
    pub fn preload_page(&self) -> &[u8] {
        self.role_page(PageRole::Preload)
    }

    /// The handoff record as patched into the placed preloader.
    pub fn handoff_record(&self) -> HandoffRecord {
        let offset = self.physical_entry.as_u32() - self.layout.preload.as_u32();
        let start = offset as usize - HandoffRecord::SIZE;
        HandoffRecord::read_from(&self.preload_page()[start..]).unwrap_or_default()
    }

    /// Physical addresses stored in the index page of `kind`.
    pub fn index_entries(&self, kind: ImageKind) -> Vec<PhysAddr> {
        let (role, count) = match kind {
            ImageKind::Kernel => (PageRole::KernelIndex, self.kernel_pages()),
            ImageKind::Initrd => (PageRole::InitrdIndex, self.initrd_pages()),
        };
        self.role_page(role)
            .chunks_exact(4)
            .take(count)
            .map(|w| PhysAddr::new(u32::from_le_bytes([w[0], w[1], w[2], w[3]])))
            .collect()
    }

    pub fn image_page(&self, kind: ImageKind, index: usize) -> Option<&[u8]> {
        let desc = *self.descriptors(kind.role()).get(index)?;
        Some(self.page(desc))
    }

    /// Writable image page `index` of `kind`, `None` past the image.
    pub fn image_page_mut(&mut self, kind: ImageKind, index: usize) -> Option<&mut [u8]> {
        let desc = *self.descriptors(kind.role()).get(index)?;
        Some(self.page_mut(desc))
    }

    pub(crate) fn into_loaded(self) -> LoadedPlan<'a> {
        LoadedPlan { plan: self }
    }

    fn write_tags(&mut self, ram_size: u32, cmdline: &str) -> BootResult<()> {
        let ram_start = self.layout.ram_start;
        let initrd_start = self.layout.initrd_destination();
        let initrd_size = self.initrd_size as u32;
        let page = self.role_page_mut(PageRole::Tags);
        atags::encode_into(
            &mut page[..TAG_SIZE],
            ram_start,
            ram_size,
            cmdline,
            initrd_start,
            initrd_size,
        )?;
        Ok(())
    }

    fn write_index(&mut self, kind: ImageKind) {
        let (role, entries) = match kind {
            ImageKind::Kernel => (PageRole::KernelIndex, self.layout.kernel.clone()),
            ImageKind::Initrd => (PageRole::InitrdIndex, self.layout.initrd.clone()),
        };
        let page = self.role_page_mut(role);
        for (slot, phys) in page.chunks_exact_mut(4).zip(entries) {
            slot.copy_from_slice(&phys.as_u32().to_le_bytes());
        }
    }

    fn write_preload_data(&mut self, video_ram: Option<PhysAddr>) {
        let data = PreloadData {
            machine_type: self.machine_type,
            video_ram: video_ram.map_or(0, PhysAddr::as_u32),
            ram_start: self.layout.ram_start.as_u32(),
            tags: self.layout.tags.as_u32(),
            kernel_size: self.kernel_size as u32,
            kernel_index: self.layout.kernel_index.as_u32(),
            initrd_size: self.initrd_size as u32,
            initrd_index: self.layout.initrd_index.as_u32(),
        };
        data.write_to(self.role_page_mut(PageRole::Data));
    }

    fn place_package(&mut self, package: &PreloadPackage<'_>) {
        let preload = self.layout.preload;
        let record = HandoffRecord {
            stack: self.layout.stack.as_u32() + PAGE_SIZE as u32,
            data: self.layout.data.as_u32(),
            exec_code: preload.offset(package.entry_offset() as u32).as_u32(),
        };

        let page = self.role_page_mut(PageRole::Preload);
        let code = package.code();
        page[..code.len()].copy_from_slice(code);
        let at = package.handoff_offset();
        record.write_to(&mut page[at..at + HandoffRecord::SIZE]);
    }
}

impl ImageKind {
    pub fn role(&self) -> PageRole {
        match self {
            ImageKind::Kernel => PageRole::Kernel,
            ImageKind::Initrd => PageRole::Initrd,
        }
    }
}

/// A plan whose image pages have been filled by a loader. Only these can
/// be launched.
pub struct LoadedPlan<'a> {
    plan: BootPlan<'a>,
}

impl<'a> Deref for LoadedPlan<'a> {
    type Target = BootPlan<'a>;

    fn deref(&self) -> &Self::Target {
        &self.plan
    }
}
