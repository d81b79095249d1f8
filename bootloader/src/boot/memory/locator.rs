// Page locator: virtual pages -> physical pages, sorted by physical address

use alloc::vec::Vec;

use linboot_core::{VirtAddr, PAGE_SIZE};
use linboot_hwinit::AddressSpace;

use super::types::PageDescriptor;
use crate::boot::error::{BootError, BootResult};

/// Translate `count` consecutive pages starting at page-aligned `base`.
pub fn locate_pages(
    space: &dyn AddressSpace,
    base: VirtAddr,
    count: usize,
) -> BootResult<Vec<PageDescriptor>> {
    let mut pages = Vec::with_capacity(count);
    for i in 0..count {
        let virt = base.offset(i * PAGE_SIZE);
        let phys = space
            .virt_to_phys(virt)
            .ok_or(BootError::UnmappedPage { virt })?;
        pages.push(PageDescriptor { virt, phys });
    }
    Ok(pages)
}

/// Order pages by ascending physical address.
pub fn sort_by_phys(pages: &mut [PageDescriptor]) {
    pages.sort_unstable_by_key(|p| p.phys);
}
