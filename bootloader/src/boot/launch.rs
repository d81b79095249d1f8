//! Launch orchestration
//!
//! ```text
//!   Idle ─▶ PlanBuilt ─▶ ImagesLoaded ─┬─▶ DirectLaunch ─▶ Committed ─▶ (kernel)
//!                                       │        │               │
//!                                       │        ▼               ▼
//!                                       │     Aborted      Unrecoverable
//!                                       └─▶ ResumeHooked ─▶ Aborted (timeout)
//! ```
//!
//! Everything that can fail is checked before interrupts go off:
//! trampoline placement, translation table mapping, the machine's
//! pre-shutdown hook, the resume vector contents. After that the only
//! way back is a trampoline that returned, which poisons the launcher.

use core::fmt;

use linboot_core::PhysAddr;
use linboot_hwinit::ControlGuard;

use super::error::BootError;
use super::handoff::setup_trampoline;
use super::memory::LoadedPlan;
use super::platform::Platform;
use super::preloader::{draw_line, COLOR_GREEN, COLOR_MAGENTA};
use super::resume::{hook_words, ResumeVector};

/// How control reaches the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Shut the hardware down and jump now.
    Direct,
    /// Hook the firmware resume vector and wait for a suspend/resume cycle.
    Resume { vector: PhysAddr, timeout_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    PlanBuilt,
    ImagesLoaded,
    DirectLaunch,
    ResumeHooked,
    Committed,
    Aborted,
    Unrecoverable,
}

impl LaunchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchState::Idle => "idle",
            LaunchState::PlanBuilt => "plan built",
            LaunchState::ImagesLoaded => "images loaded",
            LaunchState::DirectLaunch => "direct launch",
            LaunchState::ResumeHooked => "resume hooked",
            LaunchState::Committed => "committed",
            LaunchState::Aborted => "aborted",
            LaunchState::Unrecoverable => "unrecoverable",
        }
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one boot attempt at a time through the launch states.
#[derive(Debug)]
pub struct Launcher {
    state: LaunchState,
    poisoned: bool,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher {
    pub const fn new() -> Self {
        Self {
            state: LaunchState::Idle,
            poisoned: false,
        }
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// A trampoline came back earlier; the device state is unknown.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) fn set_state(&mut self, state: LaunchState) {
        self.state = state;
    }

    /// Fail early when poisoned.
    pub fn check(&self) -> Result<(), BootError> {
        if self.poisoned {
            log::error!("Earlier boot attempt left the device in an unknown state");
            return Err(BootError::SessionPoisoned);
        }
        Ok(())
    }

    /// Hand control to the kernel. Only returns on failure.
    ///
    /// The plan (and its scratch memory) is released when this returns.
    pub fn launch(
        &mut self,
        platform: &Platform<'_>,
        plan: LoadedPlan<'_>,
        mode: LaunchMode,
    ) -> BootError {
        if let Err(e) = self.check() {
            return e;
        }
        self.state = LaunchState::ImagesLoaded;

        let entry = plan.physical_entry();
        log::info!("Launching to physical address {}", entry);

        let err = match mode {
            LaunchMode::Direct => self.launch_direct(platform, entry),
            LaunchMode::Resume { vector, timeout_ms } => {
                self.resume_into_boot(platform, entry, vector, timeout_ms)
            }
        };
        drop(plan);
        err
    }

    fn abort(&mut self, err: BootError) -> BootError {
        self.state = LaunchState::Aborted;
        err
    }

    fn launch_direct(&mut self, platform: &Platform<'_>, entry: PhysAddr) -> BootError {
        let cpu = platform.cpu;

        // Fault in everything that runs after interrupts go off
        cpu.touch_app_pages();

        let trampoline = match setup_trampoline(cpu, platform.space) {
            Ok(t) => t,
            Err(e) => return self.abort(e),
        };

        let table_phys = cpu.translation_table();
        let Some(table) = platform.space.phys_to_virt(table_phys) else {
            log::error!("Could not map MMU table {}", table_phys);
            return self.abort(BootError::TranslationTableUnmapped { phys: table_phys });
        };
        log::debug!("MMU setup: mmu={}/{}", table, table_phys);

        let framebuffer = platform.boot_framebuffer();
        if let Some(fb) = framebuffer {
            log::debug!("Video buffer at virt={}", fb.virt);
        }

        if let Err(e) = platform.machine.pre_hardware_shutdown() {
            log::error!("Hardware shutdown refused: {}", e);
            return self.abort(BootError::PreShutdownFailed(e));
        }

        log::info!(target: "screen", "Go Go Go...");

        // No logging from here on
        let guard = ControlGuard::new(cpu);
        self.state = LaunchState::DirectLaunch;

        let mut video_ram = framebuffer.map_or(0, |fb| fb.virt.as_usize());
        // SAFETY: the framebuffer mapping is supplied by the host and
        // covers the progress lines.
        unsafe { draw_line(&mut video_ram, COLOR_GREEN) };

        platform.machine.hardware_shutdown();

        unsafe { draw_line(&mut video_ram, COLOR_MAGENTA) };

        self.state = LaunchState::Committed;
        // SAFETY: trampoline placement and table mapping were verified
        // above, and the plan outlives this call.
        unsafe { cpu.mmu_trampoline(trampoline.phys, table, entry) };

        drop(guard);
        self.state = LaunchState::Unrecoverable;
        self.poisoned = true;
        log::error!("MMU trampoline returned, device state unknown");
        BootError::TrampolineDidNotReturnControl
    }

    fn resume_into_boot(
        &mut self,
        platform: &Platform<'_>,
        entry: PhysAddr,
        vector: PhysAddr,
        timeout_ms: u32,
    ) -> BootError {
        let resume = match ResumeVector::map(platform, vector) {
            Ok(r) => r,
            Err(e) => return self.abort(e),
        };
        let stock = match resume.verify_stock() {
            Ok(words) => words,
            Err(e) => return self.abort(e),
        };

        resume.write(platform, hook_words(entry));
        self.state = LaunchState::ResumeHooked;

        log::info!(target: "screen", "Ready to boot.  Please suspend/resume");
        platform.clock.sleep_ms(timeout_ms);

        log::warn!("Timeout. Restoring original resume vector");
        resume.write(platform, stock);
        self.abort(BootError::ResumeTimedOut)
    }
}
