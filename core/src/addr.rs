//! Physical and Virtual Address Types
//!
//! The loader juggles two address spaces at once: the host's virtual
//! mapping (where our buffers live while the MMU is on) and the ARM
//! physical bus (where the preloader and kernel run once it is off).
//! Mixing the two is the classic way to corrupt a boot, so they are
//! distinct newtypes.
//!
//! # Design
//!
//! - `PhysAddr` is 32 bits wide: every target is a 32-bit ARM SoC.
//! - `VirtAddr` is pointer sized so the same code can be exercised on a
//!   64-bit development host.
//! - Both are `#[repr(transparent)]`, so they are safe inside `#[repr(C)]`
//!   records shared with position-independent code.

use core::fmt;

/// Page size (4KB, the ARM small-page size).
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_MASK: u32 = !(PAGE_SIZE as u32 - 1);

/// First-level section size (1MB) of the ARMv4-v7 short descriptor format.
pub const SECTION_SIZE: u32 = 0x0010_0000;
pub const SECTION_MASK: u32 = !(SECTION_SIZE - 1);

/// Physical memory address.
///
/// Represents an address on the physical bus, as used with the MMU off.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(pub u32);

/// Virtual memory address.
///
/// Represents an address in the running environment's address space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(pub usize);

impl PhysAddr {
    #[inline]
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & !PAGE_MASK == 0
    }

    #[inline]
    #[must_use]
    pub const fn page_align_down(self) -> Self {
        Self(self.0 & PAGE_MASK)
    }

    /// Base of the 1MB first-level section containing this address.
    #[inline]
    #[must_use]
    pub const fn section_base(self) -> Self {
        Self(self.0 & SECTION_MASK)
    }

    /// Add an offset to this address.
    #[inline]
    #[must_use]
    pub const fn offset(self, offset: u32) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Checked variant of [`offset`](Self::offset).
    #[inline]
    #[must_use]
    pub const fn checked_offset(self, offset: u32) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl VirtAddr {
    #[inline]
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    #[inline]
    #[must_use]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & (PAGE_SIZE - 1) == 0
    }

    #[inline]
    #[must_use]
    pub const fn page_align_down(self) -> Self {
        Self(self.0 & !(PAGE_SIZE - 1))
    }

    #[inline]
    #[must_use]
    pub const fn page_align_up(self) -> Self {
        Self((self.0 + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
    }

    #[inline]
    #[must_use]
    pub const fn offset(self, offset: usize) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Page number of this address (address >> 12).
    #[inline]
    #[must_use]
    pub const fn page_number(self) -> usize {
        self.0 >> PAGE_SHIFT
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#010x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u32> for PhysAddr {
    fn from(addr: u32) -> Self {
        Self(addr)
    }
}

impl From<PhysAddr> for u32 {
    fn from(addr: PhysAddr) -> Self {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phys_alignment() {
        let addr = PhysAddr::new(0x1000_8123);
        assert!(!addr.is_page_aligned());
        assert_eq!(addr.page_align_down(), PhysAddr::new(0x1000_8000));
        assert_eq!(addr.section_base(), PhysAddr::new(0x1000_0000));
        assert!(PhysAddr::new(0x1000_8000).is_page_aligned());
    }

    #[test]
    fn test_phys_offset_overflow() {
        assert_eq!(PhysAddr::new(0xffff_f000).checked_offset(0x1000), None);
        assert_eq!(
            PhysAddr::new(0x1000_0000).checked_offset(0x100),
            Some(PhysAddr::new(0x1000_0100))
        );
    }

    #[test]
    fn test_virt_alignment() {
        let addr = VirtAddr::new(0x2_0001);
        assert_eq!(addr.page_align_up(), VirtAddr::new(0x2_1000));
        assert_eq!(addr.page_align_down(), VirtAddr::new(0x2_0000));
        assert_eq!(addr.page_number(), 0x20);
        assert!(VirtAddr::new(0x3000).is_page_aligned());
    }

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(format!("{}", PhysAddr::new(0x100)), "00000100");
        assert_eq!(format!("{:?}", PhysAddr::new(0xa004_0000)), "PhysAddr(0xa0040000)");
    }
}
