//! Preloader
//!
//! The code that runs with the MMU off, from a single scratch page, after
//! the host environment is gone:
//!
//! ```text
//!   tag page      ──copy──▶ RAM + 0x100
//!   kernel pages  ──copy──▶ RAM + 0x8000       (via kernel index page)
//!   initrd pages  ──copy──▶ RAM + 0x508000     (via initrd index page)
//!   jump          ────────▶ RAM + 0x8000 (0, machine_type, RAM + 0x100)
//! ```
//!
//! Everything in the `linboot_preload` section is copied verbatim to that
//! page and executed at its physical address. It must reference nothing
//! outside the section: no statics, no out-of-line calls (helpers are
//! `#[inline(always)]`, loops are plain `while` loops over raw pointers,
//! arithmetic is wrapping), and volatile copies so no `memcpy` is emitted.
//! All inputs arrive through one [`PreloadData`] pointer.

use linboot_core::PAGE_SIZE;

use super::error::{BootError, BootResult};
use super::handoff::{HandoffRecord, HANDLER_SIZE};
use super::memory::{PHYSOFFSET_INITRD, PHYSOFFSET_KERNEL, PHYSOFFSET_TAGS};

// RGB565 colors for the progress lines
pub const COLOR_BLACK: u16 = 0x0000;
pub const COLOR_WHITE: u16 = 0xffff;
pub const COLOR_RED: u16 = 0xf800;
pub const COLOR_GREEN: u16 = 0x07e0;
pub const COLOR_BLUE: u16 = 0x001f;
pub const COLOR_YELLOW: u16 = COLOR_RED | COLOR_GREEN;
pub const COLOR_CYAN: u16 = COLOR_GREEN | COLOR_BLUE;
pub const COLOR_MAGENTA: u16 = COLOR_RED | COLOR_BLUE;

/// Pixels per progress line.
pub const LINE_PIXELS: usize = 2500;
/// First pixel of the first progress line.
pub const LINE_ORIGIN: usize = 32768;
/// Bytes the framebuffer pointer advances per line.
pub const LINE_STRIDE: usize = LINE_PIXELS * core::mem::size_of::<u16>();

/// Everything the preloader knows. Physical addresses and byte counts.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadData {
    pub machine_type: u32,
    /// Framebuffer for progress lines, 0 for none.
    pub video_ram: u32,
    pub ram_start: u32,
    pub tags: u32,
    pub kernel_size: u32,
    pub kernel_index: u32,
    pub initrd_size: u32,
    pub initrd_index: u32,
}

const _: () = assert!(core::mem::size_of::<PreloadData>() <= PAGE_SIZE);

impl PreloadData {
    pub const SIZE: usize = core::mem::size_of::<PreloadData>();

    fn words(&self) -> [u32; 8] {
        [
            self.machine_type,
            self.video_ram,
            self.ram_start,
            self.tags,
            self.kernel_size,
            self.kernel_index,
            self.initrd_size,
            self.initrd_index,
        ]
    }

    /// Store in target (little-endian) layout.
    pub fn write_to(&self, bytes: &mut [u8]) {
        for (i, word) in self.words().iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    pub fn read_from(bytes: &[u8]) -> Option<Self> {
        let mut w = [0u32; 8];
        for (i, slot) in w.iter_mut().enumerate() {
            let b = bytes.get(i * 4..i * 4 + 4)?;
            *slot = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        }
        Some(Self {
            machine_type: w[0],
            video_ram: w[1],
            ram_start: w[2],
            tags: w[3],
            kernel_size: w[4],
            kernel_index: w[5],
            initrd_size: w[6],
            initrd_index: w[7],
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PACKAGE
// ═══════════════════════════════════════════════════════════════════════════

/// The preloader blob and the offsets the plan builder patches.
#[derive(Debug, Clone, Copy)]
pub struct PreloadPackage<'a> {
    code: &'a [u8],
    entry_offset: usize,
    handoff_offset: usize,
}

impl<'a> PreloadPackage<'a> {
    pub const fn new(code: &'a [u8], entry_offset: usize, handoff_offset: usize) -> Self {
        Self {
            code,
            entry_offset,
            handoff_offset,
        }
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    /// Offset of the preloader routine (may carry the Thumb bit).
    pub fn entry_offset(&self) -> usize {
        self.entry_offset
    }

    pub fn handoff_offset(&self) -> usize {
        self.handoff_offset
    }

    /// Offset of the stack-jumper handler, the physical entry point.
    pub fn handler_offset(&self) -> usize {
        self.handoff_offset + HandoffRecord::SIZE
    }

    pub fn validate(&self) -> BootResult<()> {
        let invalid = |reason| Err(BootError::InvalidPreloadPackage { reason });

        if self.code.is_empty() {
            return invalid("empty preloader");
        }
        if self.code.len() > PAGE_SIZE {
            return invalid("preloader larger than a page");
        }
        if self.handoff_offset % 4 != 0 {
            return invalid("handoff record not word aligned");
        }
        if self.handler_offset() + HANDLER_SIZE > self.code.len() {
            return invalid("handoff record outside preloader");
        }
        if self.entry_offset & !1 >= self.code.len() {
            return invalid("entry point outside preloader");
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RELOCATION ROUTINE
// ═══════════════════════════════════════════════════════════════════════════

/// Draw one progress line and advance `video_ram` past it. No-op when 0.
///
/// # Safety
/// A non-zero `video_ram` must address a framebuffer of at least
/// `LINE_ORIGIN + LINE_PIXELS` pixels.
#[inline(always)]
pub unsafe fn draw_line(video_ram: &mut usize, color: u16) {
    if *video_ram == 0 {
        return;
    }
    let pix = (*video_ram as *mut u16).wrapping_add(LINE_ORIGIN);
    let mut i = 0;
    while i < LINE_PIXELS {
        core::ptr::write_volatile(pix.wrapping_add(i), color);
        i += 1;
    }
    *video_ram = video_ram.wrapping_add(LINE_STRIDE);
}

/// Word copy of `bytes` (a multiple of 4).
///
/// # Safety
/// Both ranges must be valid and must not overlap.
#[inline(always)]
pub unsafe fn copy_words(dest: *mut u32, src: *const u32, bytes: usize) {
    let words = bytes >> 2;
    let mut i = 0;
    while i < words {
        core::ptr::write_volatile(dest.wrapping_add(i), core::ptr::read_volatile(src.wrapping_add(i)));
        i += 1;
    }
}

/// Copy the pages listed in `index` to one linear run at `dest`.
#[inline(always)]
unsafe fn copy_pages(dest: usize, index: *const u32, bytes: u32) {
    let mut dest = dest;
    let mut index = index;
    let mut copied: u32 = 0;
    while copied < bytes {
        let src = core::ptr::read_volatile(index) as usize;
        copy_words(dest as *mut u32, src as *const u32, PAGE_SIZE);
        index = index.wrapping_add(1);
        dest = dest.wrapping_add(PAGE_SIZE);
        copied = copied.wrapping_add(PAGE_SIZE as u32);
    }
}

type KernelEntry = unsafe extern "C" fn(zero: u32, machine_type: u32, tags: u32) -> !;

/// Relocate tags, kernel and initrd, then enter the kernel.
///
/// # Safety
/// MMU off, running from the placed preloader page, with `data` set up by
/// the plan builder.
#[cfg_attr(target_arch = "arm", link_section = "linboot_preload")]
#[no_mangle]
pub unsafe extern "C" fn linboot_preloader(data: *const PreloadData) -> ! {
    let data = &*data;
    let ram = data.ram_start as usize;
    let mut video_ram = data.video_ram as usize;

    draw_line(&mut video_ram, COLOR_BLUE);

    let dest_tags = ram.wrapping_add(PHYSOFFSET_TAGS as usize);
    copy_words(dest_tags as *mut u32, data.tags as usize as *const u32, PAGE_SIZE);

    draw_line(&mut video_ram, COLOR_RED);

    let dest_kernel = ram.wrapping_add(PHYSOFFSET_KERNEL as usize);
    copy_pages(dest_kernel, data.kernel_index as usize as *const u32, data.kernel_size);

    draw_line(&mut video_ram, COLOR_CYAN);

    if data.initrd_size != 0 {
        let dest_initrd = ram.wrapping_add(PHYSOFFSET_INITRD as usize);
        copy_pages(dest_initrd, data.initrd_index as usize as *const u32, data.initrd_size);
    }

    draw_line(&mut video_ram, COLOR_BLACK);

    let kernel: KernelEntry = core::mem::transmute(dest_kernel);
    kernel(0, data.machine_type, dest_tags as u32)
}
