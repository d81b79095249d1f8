//! Cache clean/invalidate routines.
//!
//! Before the MMU goes off every dirty line has to reach RAM: the preloader
//! reads the page lists and the kernel image through physical addresses
//! with the caches disabled. Each core generation needs a different CP15
//! sequence, so machines pick one through [`CacheFlavor`].
//!
//! Barriers use the CP15 encodings so the same code assembles for ARMv4
//! through ARMv7 targets. On any other architecture the routines are no-ops.

/// Core generation, as far as cache maintenance is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFlavor {
    /// ARMv4/v5 (ARM920T and friends): clean by segment/index.
    Arm4,
    /// ARMv6 (ARM11): whole-cache operations.
    Arm6,
    /// ARMv7 (Cortex-A, Scorpion): clean by set/way from CLIDR.
    Arm7,
}

impl CacheFlavor {
    pub fn flush(self) {
        match self {
            CacheFlavor::Arm4 => flush_cache_arm4(),
            CacheFlavor::Arm6 => flush_cache_arm6(),
            CacheFlavor::Arm7 => flush_cache_arm7(),
        }
    }
}

#[cfg(target_arch = "arm")]
mod imp {
    use core::arch::asm;

    // ARM920T: 16KB D-cache, 8 segments of 64 lines.
    const ARM4_SEGMENTS: u32 = 8;
    const ARM4_INDEXES: u32 = 64;

    #[inline(always)]
    fn drain_write_buffer() {
        unsafe { asm!("mcr p15, 0, {0}, c7, c10, 4", in(reg) 0u32, options(nostack)) };
    }

    #[inline(always)]
    fn invalidate_icache() {
        unsafe { asm!("mcr p15, 0, {0}, c7, c5, 0", in(reg) 0u32, options(nostack)) };
    }

    #[inline(always)]
    fn invalidate_tlb() {
        unsafe { asm!("mcr p15, 0, {0}, c8, c7, 0", in(reg) 0u32, options(nostack)) };
    }

    pub fn flush_cache_arm4() {
        for segment in 0..ARM4_SEGMENTS {
            for index in 0..ARM4_INDEXES {
                let entry = (index << 26) | (segment << 5);
                unsafe {
                    asm!("mcr p15, 0, {0}, c7, c14, 2", in(reg) entry, options(nostack));
                }
            }
        }
        invalidate_icache();
        drain_write_buffer();
        invalidate_tlb();
    }

    pub fn flush_cache_arm6() {
        unsafe {
            // Clean and invalidate entire data cache
            asm!("mcr p15, 0, {0}, c7, c14, 0", in(reg) 0u32, options(nostack));
        }
        invalidate_icache();
        drain_write_buffer();
        invalidate_tlb();
    }

    pub fn flush_cache_arm7() {
        let clidr: u32;
        unsafe { asm!("mrc p15, 1, {0}, c0, c0, 1", out(reg) clidr, options(nostack)) };

        let level_of_coherency = (clidr >> 24) & 0x7;
        for level in 0..level_of_coherency {
            let cache_type = (clidr >> (level * 3)) & 0x7;
            if cache_type < 2 {
                // Instruction only, or no cache at this level
                continue;
            }

            let ccsidr: u32;
            unsafe {
                asm!(
                    "mcr p15, 2, {sel}, c0, c0, 0",
                    "mcr p15, 0, {zero}, c7, c5, 4",
                    "mrc p15, 1, {out}, c0, c0, 0",
                    sel = in(reg) level << 1,
                    zero = in(reg) 0u32,
                    out = lateout(reg) ccsidr,
                    options(nostack),
                );
            }

            let line_shift = (ccsidr & 0x7) + 4;
            let ways = ((ccsidr >> 3) & 0x3ff) + 1;
            let sets = ((ccsidr >> 13) & 0x7fff) + 1;
            let way_shift = (ways - 1).leading_zeros();

            for way in 0..ways {
                for set in 0..sets {
                    let set_way =
                        way.checked_shl(way_shift).unwrap_or(0) | (set << line_shift) | (level << 1);
                    unsafe {
                        asm!("mcr p15, 0, {0}, c7, c14, 2", in(reg) set_way, options(nostack));
                    }
                }
            }
        }

        invalidate_icache();
        drain_write_buffer();
        invalidate_tlb();
    }
}

#[cfg(not(target_arch = "arm"))]
mod imp {
    pub fn flush_cache_arm4() {}
    pub fn flush_cache_arm6() {}
    pub fn flush_cache_arm7() {}
}

pub use imp::{flush_cache_arm4, flush_cache_arm6, flush_cache_arm7};
