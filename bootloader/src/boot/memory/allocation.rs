// Scratch memory backing a boot plan

use core::alloc::Layout;
use core::ptr::NonNull;

use linked_list_allocator::Heap;
use spin::Mutex;

use linboot_core::VirtAddr;

use crate::boot::error::{BootError, BootResult};

const SCRATCH_ALIGN: usize = 8;

/// Source of zeroed scratch memory.
pub trait ScratchAllocator {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate_zeroed` on this allocator with `size`.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// Owned scratch block, released on drop.
pub struct ScratchBlock<'a> {
    allocator: &'a dyn ScratchAllocator,
    ptr: NonNull<u8>,
    size: usize,
}

impl<'a> ScratchBlock<'a> {
    /// Allocate `size` zeroed bytes. `pages` is only used for reporting.
    pub fn new(allocator: &'a dyn ScratchAllocator, size: usize, pages: usize) -> BootResult<Self> {
        let ptr = allocator
            .allocate_zeroed(size)
            .ok_or(BootError::AllocationFailure { pages })?;
        Ok(Self {
            allocator,
            ptr,
            size,
        })
    }

    pub fn base(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.ptr.as_ptr())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, virt: VirtAddr, len: usize) -> bool {
        let start = self.base().as_usize();
        virt.as_usize() >= start && virt.as_usize() + len <= start + self.size
    }
}

impl Drop for ScratchBlock<'_> {
    fn drop(&mut self) {
        // SAFETY: ptr/size came from this allocator in `new`.
        unsafe { self.allocator.release(self.ptr, self.size) };
    }
}

fn scratch_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size.max(1), SCRATCH_ALIGN).ok()
}

// ═══════════════════════════════════════════════════════════════════════════
// GLOBAL ALLOCATOR
// ═══════════════════════════════════════════════════════════════════════════

/// The global allocator with calloc semantics.
pub struct GlobalScratch;

impl ScratchAllocator for GlobalScratch {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = scratch_layout(size)?;
        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { alloc::alloc::alloc_zeroed(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if let Some(layout) = scratch_layout(size) {
            alloc::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ARENA ALLOCATOR
// ═══════════════════════════════════════════════════════════════════════════

/// Scratch memory carved from a caller-provided arena.
pub struct ArenaScratch {
    heap: Mutex<Heap>,
}

impl ArenaScratch {
    /// # Safety
    /// `arena..arena+size` must be valid, writable, unused memory that
    /// outlives this allocator.
    pub unsafe fn new(arena: *mut u8, size: usize) -> Self {
        let mut heap = Heap::empty();
        heap.init(arena, size);
        Self {
            heap: Mutex::new(heap),
        }
    }

    pub fn free(&self) -> usize {
        self.heap.lock().free()
    }
}

impl ScratchAllocator for ArenaScratch {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = scratch_layout(size)?;
        let ptr = self.heap.lock().allocate_first_fit(layout).ok()?;
        // SAFETY: freshly allocated block of `layout.size()` bytes.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, layout.size()) };
        Some(ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if let Some(layout) = scratch_layout(size) {
            self.heap.lock().deallocate(ptr, layout);
        }
    }
}
