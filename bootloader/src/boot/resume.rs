// Resume vector hook
//
// The host firmware jumps to a fixed physical address on wake. That
// address normally holds `b 0x41000` followed by a zero word. Replacing it
// with `ldr pc, [pc, #-4]` plus our entry address makes the next resume
// land in the stack jumper with the MMU already off.

use linboot_core::PhysAddr;
use linboot_hwinit::without_interrupts;

use super::error::BootError;
use super::platform::Platform;

/// `b 0x41000` at 0x40000, the stock resume branch.
pub const RESUME_BRANCH: u32 = 0xea00_03fe;
/// `ldr pc, [pc, #-4]`: jump to the address in the next word.
pub const LDR_PC_NEXT_WORD: u32 = 0xe51f_f004;

/// The expected contents of an unhooked resume vector.
pub const STOCK_VECTOR: [u32; 2] = [RESUME_BRANCH, 0];

/// Two words at the mapped resume vector.
pub(crate) struct ResumeVector {
    words: *mut u32,
}

impl ResumeVector {
    pub(crate) fn map(platform: &Platform<'_>, vector: PhysAddr) -> Result<Self, BootError> {
        let virt = platform.space.phys_to_virt(vector).ok_or_else(|| {
            log::error!("Could not map addr {}", vector);
            BootError::ResumeVectorUnmapped { phys: vector }
        })?;
        Ok(Self {
            words: virt.as_mut_ptr::<u32>(),
        })
    }

    pub(crate) fn read(&self) -> [u32; 2] {
        // SAFETY: `words` maps two words of the resume vector.
        unsafe {
            [
                core::ptr::read_volatile(self.words),
                core::ptr::read_volatile(self.words.add(1)),
            ]
        }
    }

    /// Replace both words with interrupts off, then flush so the firmware
    /// sees them with caches off.
    pub(crate) fn write(&self, platform: &Platform<'_>, words: [u32; 2]) {
        without_interrupts(platform.cpu, || {
            // SAFETY: as in `read`.
            unsafe {
                core::ptr::write_volatile(self.words, words[0]);
                core::ptr::write_volatile(self.words.add(1), words[1]);
            }
            platform.machine.flush_cache();
        });
    }

    /// Check for the stock branch, returning the words found otherwise.
    pub(crate) fn verify_stock(&self) -> Result<[u32; 2], BootError> {
        let found = self.read();
        if found != STOCK_VECTOR {
            log::error!("Unexpected resume vector. ({:08x} {:08x})", found[0], found[1]);
            return Err(BootError::UnexpectedResumeVector { found });
        }
        Ok(found)
    }
}

/// The hook written over the stock vector.
pub const fn hook_words(entry: PhysAddr) -> [u32; 2] {
    [LDR_PC_NEXT_WORD, entry.as_u32()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_words() {
        assert_eq!(
            hook_words(PhysAddr::new(0x1100_300c)),
            [0xe51f_f004, 0x1100_300c]
        );
    }
}
