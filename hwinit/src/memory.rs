//! Address-space services
//!
//! The loader runs with the MMU on, inside whatever mapping the host
//! environment set up. Everything it hands to the preloader has to be
//! expressed as physical addresses, so it needs two questions answered:
//! "where does this page of mine really live?" and "give me a pointer to
//! that physical address". [`AddressSpace`] is that capability.
//!
//! # Implementations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ TableWalker                                                     │
//! │   virt_to_phys: walk the live ARM first/second-level tables     │
//! │   phys_to_virt: look the address up in static linear windows    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hosted environments (or tests) provide their own implementation.

use linboot_core::{PhysAddr, VirtAddr, PAGE_SIZE};

// ═══════════════════════════════════════════════════════════════════════════
// RAM REGION
// ═══════════════════════════════════════════════════════════════════════════

/// The physical RAM bank Linux will be booted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamRegion {
    pub base: PhysAddr,
    pub size: u32,
}

impl RamRegion {
    pub const fn new(base: PhysAddr, size: u32) -> Self {
        Self { base, size }
    }

    pub fn contains(&self, addr: PhysAddr) -> bool {
        addr >= self.base && (addr.as_u32() - self.base.as_u32()) < self.size
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ADDRESS SPACE CAPABILITY
// ═══════════════════════════════════════════════════════════════════════════

pub trait AddressSpace {
    /// RAM bank reported to the kernel.
    fn ram(&self) -> RamRegion;

    /// Physical address backing `virt`, `None` if the page is unmapped.
    fn virt_to_phys(&self, virt: VirtAddr) -> Option<PhysAddr>;

    /// Map a physical address for access by the loader.
    fn phys_to_virt(&self, phys: PhysAddr) -> Option<VirtAddr>;

    /// Modified virtual address (FCSE-relocated) of `virt`.
    ///
    /// Code addresses obtained from the running image are process relative
    /// on some hosts; table walks and overlap checks must use the MVA.
    fn modified_virt(&self, virt: VirtAddr) -> VirtAddr {
        virt
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TABLE WALKER
// ═══════════════════════════════════════════════════════════════════════════

/// A statically mapped physical window.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub phys: PhysAddr,
    pub virt: VirtAddr,
    pub size: u32,
}

impl Window {
    fn translate(&self, phys: PhysAddr) -> Option<VirtAddr> {
        let offset = phys.as_u32().checked_sub(self.phys.as_u32())?;
        if offset < self.size {
            Some(self.virt.offset(offset as usize))
        } else {
            None
        }
    }
}

// Short-descriptor format (ARMv4-v7).
const L1_TYPE_MASK: u32 = 0b11;
const L1_COARSE: u32 = 0b01;
const L1_SECTION: u32 = 0b10;
const L1_FINE: u32 = 0b11;

const L2_TYPE_MASK: u32 = 0b11;
const L2_LARGE: u32 = 0b01;
const L2_SMALL: u32 = 0b10;
const L2_TINY_OR_EXT_SMALL: u32 = 0b11;

/// Address space backed by the live ARM translation tables.
pub struct TableWalker<'a> {
    ram: RamRegion,
    /// Mapped first-level table (16KB, 4096 entries).
    l1: VirtAddr,
    windows: &'a [Window],
}

impl<'a> TableWalker<'a> {
    /// # Safety
    /// `l1` must point at the active first-level table, and every window
    /// must describe a valid, permanent mapping.
    pub unsafe fn new(ram: RamRegion, l1: VirtAddr, windows: &'a [Window]) -> Self {
        Self { ram, l1, windows }
    }

    fn read_phys_word(&self, phys: PhysAddr) -> Option<u32> {
        let virt = self.phys_to_virt(phys)?;
        // SAFETY: the window covers `phys` per the constructor contract.
        Some(unsafe { core::ptr::read_volatile(virt.as_ptr::<u32>()) })
    }

    fn walk(&self, mva: u32) -> Option<PhysAddr> {
        // SAFETY: `l1` maps the whole 16KB table per the constructor contract.
        let l1_entry = unsafe {
            core::ptr::read_volatile(self.l1.as_ptr::<u32>().add((mva >> 20) as usize))
        };

        match l1_entry & L1_TYPE_MASK {
            L1_SECTION => Some(PhysAddr::new((l1_entry & 0xfff0_0000) | (mva & 0x000f_ffff))),
            L1_COARSE => {
                let table = l1_entry & 0xffff_fc00;
                let index = (mva >> 12) & 0xff;
                self.walk_l2(PhysAddr::new(table + index * 4), mva)
            }
            L1_FINE => {
                let table = l1_entry & 0xffff_f000;
                let index = (mva >> 10) & 0x3ff;
                self.walk_l2(PhysAddr::new(table + index * 4), mva)
            }
            _ => None,
        }
    }

    fn walk_l2(&self, entry_addr: PhysAddr, mva: u32) -> Option<PhysAddr> {
        let l2_entry = self.read_phys_word(entry_addr)?;
        match l2_entry & L2_TYPE_MASK {
            L2_LARGE => Some(PhysAddr::new((l2_entry & 0xffff_0000) | (mva & 0xffff))),
            L2_SMALL | L2_TINY_OR_EXT_SMALL => {
                Some(PhysAddr::new((l2_entry & 0xffff_f000) | (mva & 0xfff)))
            }
            _ => None,
        }
    }
}

impl AddressSpace for TableWalker<'_> {
    fn ram(&self) -> RamRegion {
        self.ram
    }

    fn virt_to_phys(&self, virt: VirtAddr) -> Option<PhysAddr> {
        let mva = u32::try_from(self.modified_virt(virt).as_usize()).ok()?;
        self.walk(mva)
    }

    fn phys_to_virt(&self, phys: PhysAddr) -> Option<VirtAddr> {
        self.windows.iter().find_map(|w| w.translate(phys))
    }
}

/// Number of whole pages needed for `bytes`.
#[inline]
pub const fn pages_for(bytes: usize) -> usize {
    bytes / PAGE_SIZE + (bytes % PAGE_SIZE != 0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_region_contains() {
        let ram = RamRegion::new(PhysAddr::new(0x1000_0000), 0x0400_0000);
        assert!(ram.contains(PhysAddr::new(0x1000_0000)));
        assert!(ram.contains(PhysAddr::new(0x13ff_ffff)));
        assert!(!ram.contains(PhysAddr::new(0x1400_0000)));
        assert!(!ram.contains(PhysAddr::new(0x0fff_ffff)));
    }

    #[test]
    fn test_pages_for() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(PAGE_SIZE), 1);
        assert_eq!(pages_for(PAGE_SIZE * 3 + 1), 4);
    }

    #[test]
    fn test_walk_section_and_coarse_tables() {
        let mut l1 = vec![0u32; 4096];
        let mut l2 = vec![0u32; 256];

        // 0xc000_0000 section -> 0x1000_0000
        l1[0xc00] = 0x1000_0000 | L1_SECTION;
        // 0x0010_0000 coarse table at synthetic phys 0x2000_0000
        l1[0x001] = 0x2000_0000 | L1_COARSE;
        // page 3 of that MB -> 0x1234_5000
        l2[3] = 0x1234_5000 | L2_SMALL;

        let windows = [Window {
            phys: PhysAddr::new(0x2000_0000),
            virt: VirtAddr::from_ptr(l2.as_ptr()),
            size: 1024,
        }];
        let ram = RamRegion::new(PhysAddr::new(0x1000_0000), 0x0400_0000);
        let walker = unsafe { TableWalker::new(ram, VirtAddr::from_ptr(l1.as_mut_ptr()), &windows) };

        assert_eq!(
            walker.virt_to_phys(VirtAddr::new(0xc001_2345)),
            Some(PhysAddr::new(0x1001_2345))
        );
        assert_eq!(
            walker.virt_to_phys(VirtAddr::new(0x0010_3abc)),
            Some(PhysAddr::new(0x1234_5abc))
        );
        // coarse table entry 4 is a fault descriptor
        assert_eq!(walker.virt_to_phys(VirtAddr::new(0x0010_4000)), None);
        // unmapped MB
        assert_eq!(walker.virt_to_phys(VirtAddr::new(0x8000_0000)), None);
    }

    #[test]
    fn test_phys_to_virt_uses_windows() {
        let backing = vec![0u32; 16];
        let base = VirtAddr::from_ptr(backing.as_ptr());
        let windows = [Window {
            phys: PhysAddr::new(0xa004_0000),
            virt: base,
            size: 64,
        }];
        let l1 = vec![0u32; 4096];
        let ram = RamRegion::new(PhysAddr::new(0xa000_0000), 0x0400_0000);
        let walker = unsafe { TableWalker::new(ram, VirtAddr::from_ptr(l1.as_ptr()), &windows) };

        assert_eq!(walker.phys_to_virt(PhysAddr::new(0xa004_0004)), Some(base.offset(4)));
        assert_eq!(walker.phys_to_virt(PhysAddr::new(0xa004_0040)), None);
        assert_eq!(walker.phys_to_virt(PhysAddr::new(0xa003_fffc)), None);
    }
}
