//! Launch sequencing tests against recording fakes

mod common;

use common::*;

use linboot_bootloader::boot::preloader::{
    COLOR_GREEN, COLOR_MAGENTA, LINE_ORIGIN, LINE_PIXELS,
};
use linboot_bootloader::{
    load_from_memory, BootError, Framebuffer, LaunchMode, LaunchState, Launcher, LoadedPlan,
    NoProgress, Platform, RamImage,
};
use linboot_core::{PhysAddr, VirtAddr, PAGE_SIZE};
use linboot_hwinit::ShutdownError;

static KERNEL: [u8; PAGE_SIZE] = [0x5a; PAGE_SIZE];

fn loaded<'a>(rig: &'a Rig) -> LoadedPlan<'a> {
    load_from_memory(&rig.builder(""), RamImage::new(&KERNEL), None, 1, &mut NoProgress)
        .unwrap()
}

fn resume_mode(timeout_ms: u32) -> LaunchMode {
    LaunchMode::Resume {
        vector: PhysAddr::new(RESUME_PHYS),
        timeout_ms,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DIRECT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_direct_launch_order() {
    let rig = Rig::new();
    let plan = loaded(&rig);
    let entry = plan.physical_entry();
    let before = rig.journal.events().len();

    let mut launcher = Launcher::new();
    let err = launcher.launch(&rig.platform(), plan, LaunchMode::Direct);

    assert_eq!(err, BootError::TrampolineDidNotReturnControl);
    assert_eq!(
        rig.journal.events()[before..],
        [
            Event::TouchPages,
            Event::PreShutdown,
            Event::DisableIrq,
            Event::HardwareShutdown,
            Event::Trampoline {
                phys: PhysAddr::new(TRAMPOLINE_PHYS),
                table: rig.table_virt(),
                entry,
            },
            Event::EnableIrq,
        ]
    );
    assert_eq!(launcher.state(), LaunchState::Unrecoverable);
    assert!(launcher.is_poisoned());
    assert!(rig.cpu.interrupts_enabled());
    assert_eq!(rig.scratch.live(), 0);
}

#[test]
fn test_poisoned_launcher_refuses_next_plan() {
    let rig = Rig::new();
    let mut launcher = Launcher::new();
    launcher.launch(&rig.platform(), loaded(&rig), LaunchMode::Direct);

    let before = rig.journal.events().len();
    let err = launcher.launch(&rig.platform(), loaded(&rig), LaunchMode::Direct);
    assert_eq!(err, BootError::SessionPoisoned);
    assert_eq!(rig.journal.events().len(), before);
    assert_eq!(launcher.state(), LaunchState::Unrecoverable);
}

#[test]
fn test_progress_lines_drawn_around_shutdown() {
    let rig = Rig::new();
    let plan = loaded(&rig);
    let mut fb = vec![0u16; LINE_ORIGIN + 3 * LINE_PIXELS];
    let platform = rig.platform().with_framebuffer(Framebuffer {
        virt: VirtAddr::from_ptr(fb.as_mut_ptr() as *const u16),
        phys: PhysAddr::new(0x5000_0000),
    });

    Launcher::new().launch(&platform, plan, LaunchMode::Direct);

    assert_eq!(fb[LINE_ORIGIN], COLOR_GREEN);
    assert_eq!(fb[LINE_ORIGIN + LINE_PIXELS - 1], COLOR_GREEN);
    assert_eq!(fb[LINE_ORIGIN + LINE_PIXELS], COLOR_MAGENTA);
    assert_eq!(fb[LINE_ORIGIN + 2 * LINE_PIXELS], 0);
}

#[test]
fn test_inactive_framebuffer_is_left_alone() {
    let mut rig = Rig::new();
    rig.machine.framebuffer_active = false;
    let plan = loaded(&rig);
    let mut fb = vec![0u16; LINE_ORIGIN + 3 * LINE_PIXELS];
    let platform = rig.platform().with_framebuffer(Framebuffer {
        virt: VirtAddr::from_ptr(fb.as_mut_ptr() as *const u16),
        phys: PhysAddr::new(0x5000_0000),
    });

    Launcher::new().launch(&platform, plan, LaunchMode::Direct);
    assert!(fb.iter().all(|&p| p == 0));
}

#[test]
fn test_pre_shutdown_refusal_aborts_before_irq_off() {
    let mut rig = Rig::new();
    rig.machine.pre_shutdown = Err(ShutdownError::DeviceBusy("lcd"));
    let plan = loaded(&rig);

    let mut launcher = Launcher::new();
    let err = launcher.launch(&rig.platform(), plan, LaunchMode::Direct);

    assert_eq!(err, BootError::PreShutdownFailed(ShutdownError::DeviceBusy("lcd")));
    assert!(!err.is_fatal());
    assert_eq!(launcher.state(), LaunchState::Aborted);
    assert!(!launcher.is_poisoned());
    assert!(!rig.journal.contains(Event::DisableIrq));
    assert!(!rig.journal.contains(Event::HardwareShutdown));
    assert_eq!(rig.scratch.live(), 0);
}

#[test]
fn test_trampoline_spanning_pages_is_refused() {
    let mut rig = Rig::new();
    rig.cpu = RecordingCpu::new(&rig.journal)
        .with_routine(TRAMPOLINE_VIRT + 0xf80, TRAMPOLINE_VIRT + 0x1010);
    let plan = loaded(&rig);

    let mut launcher = Launcher::new();
    let err = launcher.launch(&rig.platform(), plan, LaunchMode::Direct);

    assert!(matches!(err, BootError::SpansPageBoundary { .. }));
    assert_eq!(launcher.state(), LaunchState::Aborted);
    assert!(!rig.journal.contains(Event::PreShutdown));
}

#[test]
fn test_trampoline_inside_its_identity_section_is_refused() {
    let rig = Rig::new();
    rig.space
        .pin(VirtAddr::new(TRAMPOLINE_VIRT), PhysAddr::new(TRAMPOLINE_VIRT as u32));
    let plan = loaded(&rig);

    let err = Launcher::new().launch(&rig.platform(), plan, LaunchMode::Direct);
    assert_eq!(
        err,
        BootError::OverlappingMapping {
            virt: VirtAddr::new(TRAMPOLINE_VIRT + 0x40),
            phys: PhysAddr::new(TRAMPOLINE_VIRT as u32 + 0x40),
        }
    );
    assert!(!rig.journal.contains(Event::DisableIrq));
}

#[test]
fn test_trampoline_without_physical_page_is_refused() {
    let rig = Rig::new();
    let plan = loaded(&rig);
    // No scratch lookups allowed, so only the pinned page resolves
    let space = FakeSpace::new().limit_mapped(0);
    let cpu = RecordingCpu::new(&rig.journal).with_routine(0x0009_0040, 0x0009_00c0);
    let platform = Platform::new(&space, &cpu, &rig.machine, &rig.clock);

    let mut launcher = Launcher::new();
    let err = launcher.launch(&platform, plan, LaunchMode::Direct);
    assert_eq!(
        err,
        BootError::NotInPhysicalRam {
            virt: VirtAddr::new(0x0009_0040)
        }
    );
    assert_eq!(launcher.state(), LaunchState::Aborted);
    assert!(!launcher.is_poisoned());
    assert!(!rig.journal.contains(Event::PreShutdown));
    assert!(!rig.journal.contains(Event::DisableIrq));
    assert!(!rig.journal.contains(Event::HardwareShutdown));
    assert_eq!(rig.scratch.live(), 0);
}

#[test]
fn test_unmapped_translation_table_is_refused() {
    let rig = Rig::new();
    let plan = loaded(&rig);
    // Same trampoline page, but no window over the table
    let bare = FakeSpace::new();
    let platform = Platform::new(&bare, &rig.cpu, &rig.machine, &rig.clock);

    let mut launcher = Launcher::new();
    let err = launcher.launch(&platform, plan, LaunchMode::Direct);
    assert_eq!(
        err,
        BootError::TranslationTableUnmapped {
            phys: PhysAddr::new(TABLE_PHYS)
        }
    );
    assert_eq!(launcher.state(), LaunchState::Aborted);
    assert!(!rig.journal.contains(Event::PreShutdown));
}

// ═══════════════════════════════════════════════════════════════════════════
// RESUME
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_resume_hook_written_then_restored() {
    let rig = Rig::new();
    let mut vector = [0xea00_03feu32, 0];
    let words = vector.as_mut_ptr() as *const u32;
    rig.space
        .map_window(PhysAddr::new(RESUME_PHYS), VirtAddr::from_ptr(words), 8);
    rig.clock.watch(words);

    let plan = loaded(&rig);
    let entry = plan.physical_entry();
    let before = rig.journal.events().len();

    let mut launcher = Launcher::new();
    let err = launcher.launch(&rig.platform(), plan, resume_mode(250));

    assert_eq!(err, BootError::ResumeTimedOut);
    assert_eq!(rig.clock.seen(), Some([0xe51f_f004, entry.as_u32()]));
    assert_eq!(vector, [0xea00_03fe, 0]);
    assert_eq!(
        rig.journal.events()[before..],
        [
            Event::DisableIrq,
            Event::FlushCache,
            Event::EnableIrq,
            Event::Sleep(250),
            Event::DisableIrq,
            Event::FlushCache,
            Event::EnableIrq,
        ]
    );
    assert_eq!(launcher.state(), LaunchState::Aborted);
    assert!(!launcher.is_poisoned());
    assert_eq!(rig.scratch.live(), 0);
}

#[test]
fn test_unexpected_resume_vector_left_untouched() {
    let rig = Rig::new();
    let mut vector = [0xe59f_f000u32, 0x1234];
    rig.space.map_window(
        PhysAddr::new(RESUME_PHYS),
        VirtAddr::from_ptr(vector.as_mut_ptr() as *const u32),
        8,
    );
    let plan = loaded(&rig);
    let before = rig.journal.events().len();

    let mut launcher = Launcher::new();
    let err = launcher.launch(&rig.platform(), plan, resume_mode(10));

    assert_eq!(
        err,
        BootError::UnexpectedResumeVector {
            found: [0xe59f_f000, 0x1234]
        }
    );
    assert_eq!(vector, [0xe59f_f000, 0x1234]);
    assert!(rig.journal.events()[before..].is_empty());
    assert_eq!(launcher.state(), LaunchState::Aborted);
}

#[test]
fn test_unmapped_resume_vector() {
    let rig = Rig::new();
    let plan = loaded(&rig);

    let err = Launcher::new().launch(&rig.platform(), plan, resume_mode(10));
    assert_eq!(
        err,
        BootError::ResumeVectorUnmapped {
            phys: PhysAddr::new(RESUME_PHYS)
        }
    );
    assert!(!rig.journal.contains(Event::DisableIrq));
}
