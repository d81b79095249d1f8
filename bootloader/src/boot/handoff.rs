// Handoff record and MMU trampoline checks
//
// The placed preloader page carries a 12-byte record followed by a
// three-instruction handler:
//
//   +0  stack      physical top of the stack page
//   +4  data       physical address of PreloadData
//   +8  exec_code  physical address of the preloader routine
//   +12 handler    ldr sp / ldr r0 / ldr pc from the words above
//
// The trampoline branches to +12 with the MMU off.

use linboot_core::{PhysAddr, VirtAddr, SECTION_SIZE};
use linboot_hwinit::{AddressSpace, CodeRange, Cpu};

use super::error::{BootError, BootResult};

/// Size of the stack-jumper handler following the record.
pub const HANDLER_SIZE: usize = 12;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffRecord {
    pub stack: u32,
    pub data: u32,
    pub exec_code: u32,
}

impl HandoffRecord {
    pub const SIZE: usize = core::mem::size_of::<HandoffRecord>();

    pub fn write_to(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.stack.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.data.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.exec_code.to_le_bytes());
    }

    pub fn read_from(bytes: &[u8]) -> Option<Self> {
        let word = |i: usize| {
            let b = bytes.get(i * 4..i * 4 + 4)?;
            Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        };
        Some(Self {
            stack: word(0)?,
            data: word(1)?,
            exec_code: word(2)?,
        })
    }
}

/// A verified MMU trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trampoline {
    pub virt: CodeRange,
    pub phys: PhysAddr,
}

/// Check that the MMU-disable routine can run from its identity section.
pub fn setup_trampoline(cpu: &dyn Cpu, space: &dyn AddressSpace) -> BootResult<Trampoline> {
    let routine = cpu.trampoline_routine();
    let start = space.modified_virt(routine.start);
    let end = space.modified_virt(routine.end);

    if start.page_align_down() != end.page_align_down() {
        log::error!("Can't handle trampoline spanning page boundary ({} {})", start, end);
        return Err(BootError::SpansPageBoundary { start, end });
    }

    let phys = space.virt_to_phys(start).ok_or_else(|| {
        log::error!("Trampoline not in physical ram. (virt={})", start);
        BootError::NotInPhysicalRam { virt: start }
    })?;

    // The trampoline writes an identity section for its physical MB. Its
    // own virtual range must not be inside that MB.
    if overlaps_identity_section(start, end, phys) {
        log::error!("Trampoline physical/virtual addresses overlap.");
        return Err(BootError::OverlappingMapping { virt: start, phys });
    }

    log::info!(
        "Trampoline setup (tram={}@{}/{})",
        end.as_usize() - start.as_usize(),
        start,
        phys
    );

    Ok(Trampoline {
        virt: CodeRange::new(start, end),
        phys,
    })
}

/// Closed-interval test of `[start, end]` against the 1MB section holding
/// `phys`. The top section runs to the end of the address space.
fn overlaps_identity_section(start: VirtAddr, end: VirtAddr, phys: PhysAddr) -> bool {
    let section = phys.section_base().as_u32() as usize;
    let section_end = section
        .checked_add(SECTION_SIZE as usize)
        .unwrap_or(usize::MAX);
    start.as_usize() <= section_end && end.as_usize() >= section
}
