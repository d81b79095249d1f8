//! Boot commands
//!
//! A [`BootSession`] owns everything one process needs to boot Linux: the
//! platform collaborators, scratch memory, the preloader, an image store
//! and the launcher. Attempts go through `&mut self`, so at most one runs
//! at a time.
//!
//! | Command                        | Launch                                 |
//! |--------------------------------|----------------------------------------|
//! | `BOOTLINUX`, `BOOT`, `LINUX`   | direct                                 |
//! | `BOOT2`                        | direct                                 |
//! | `RESUMEINTOBOOT`               | via the resume vector                  |

use linboot_core::{BootConfig, PhysAddr};

use super::error::{BootError, BootResult};
use super::kernel_loader::{load_from_memory, load_from_store, ImageStore, RamImage};
use super::launch::{LaunchMode, LaunchState, Launcher};
use super::memory::{LoadedPlan, PlanBuilder, ScratchAllocator};
use super::platform::Platform;
use super::preloader::PreloadPackage;
use super::progress::Progress;

/// A boot command and its help text.
#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    pub names: &'static [&'static str],
    pub help: &'static str,
}

pub static COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        names: &["BOOTLINUX", "BOOT", "LINUX"],
        help: "BOOTLINUX\n  Start booting linux kernel. See HELP VARS for variables affecting boot.",
    },
    CommandInfo {
        names: &["BOOT2"],
        help: "BOOT2\n  Same as BOOTLINUX.",
    },
    CommandInfo {
        names: &["RESUMEINTOBOOT"],
        help: "RESUMEINTOBOOT\n  Overwrite the wince resume vector so that the kernel boots\n  after suspending/resuming the pda",
    },
];

/// Look a boot command up by any of its names, ignoring case.
pub fn find_command(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS
        .iter()
        .find(|c| c.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
}

/// Commands starting with `R` boot through the resume vector.
pub fn command_mode(cmd: &str, config: &BootConfig) -> LaunchMode {
    match cmd.bytes().next() {
        Some(b'R' | b'r') => LaunchMode::Resume {
            vector: PhysAddr::new(config.resume_vector),
            timeout_ms: config.resume_timeout_ms,
        },
        _ => LaunchMode::Direct,
    }
}

pub struct BootSession<'a> {
    platform: Platform<'a>,
    allocator: &'a dyn ScratchAllocator,
    package: PreloadPackage<'a>,
    store: Option<&'a dyn ImageStore>,
    launcher: Launcher,
}

impl<'a> BootSession<'a> {
    pub fn new(
        platform: Platform<'a>,
        allocator: &'a dyn ScratchAllocator,
        package: PreloadPackage<'a>,
    ) -> Self {
        Self {
            platform,
            allocator,
            package,
            store: None,
            launcher: Launcher::new(),
        }
    }

    pub fn with_store(mut self, store: &'a dyn ImageStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn platform(&self) -> &Platform<'a> {
        &self.platform
    }

    fn builder<'b>(&self, cmdline: &'b str) -> PlanBuilder<'b>
    where
        'a: 'b,
    {
        PlanBuilder::new(self.platform, self.allocator, self.package).cmdline(cmdline)
    }

    /// Run a boot command with images named by `config`. Only returns on
    /// failure.
    pub fn boot_linux(
        &mut self,
        cmd: &str,
        config: &BootConfig,
        progress: &mut dyn Progress,
    ) -> BootError {
        if let Err(e) = self.launcher.check() {
            return e;
        }
        let mode = command_mode(cmd, config);

        let loaded = self.load_named(config, progress);
        self.dispatch(loaded, mode)
    }

    fn load_named<'b>(
        &mut self,
        config: &'b BootConfig,
        progress: &mut dyn Progress,
    ) -> BootResult<LoadedPlan<'b>>
    where
        'a: 'b,
    {
        let store = self.store.ok_or_else(|| {
            log::error!("No image store to load {} from", config.kernel);
            BootError::OpenFailed {
                name: config.kernel.clone(),
            }
        })?;
        let plan = load_from_store(
            &self.builder(&config.cmdline),
            store,
            &config.kernel,
            config.initrd_name(),
            config.machine_type,
            progress,
        )?;
        self.launcher.set_state(LaunchState::PlanBuilt);
        Ok(plan)
    }

    /// Boot images already in RAM. Only returns on failure.
    pub fn boot_ram_linux(
        &mut self,
        kernel: RamImage<'_>,
        initrd: Option<RamImage<'_>>,
        mode: LaunchMode,
        machine_type: u32,
        cmdline: &str,
        progress: &mut dyn Progress,
    ) -> BootError {
        if let Err(e) = self.launcher.check() {
            return e;
        }

        let loaded = self.load_ram(kernel, initrd, machine_type, cmdline, progress);
        self.dispatch(loaded, mode)
    }

    fn load_ram<'b>(
        &mut self,
        kernel: RamImage<'_>,
        initrd: Option<RamImage<'_>>,
        machine_type: u32,
        cmdline: &'b str,
        progress: &mut dyn Progress,
    ) -> BootResult<LoadedPlan<'b>>
    where
        'a: 'b,
    {
        let plan = load_from_memory(&self.builder(cmdline), kernel, initrd, machine_type, progress)?;
        self.launcher.set_state(LaunchState::PlanBuilt);
        Ok(plan)
    }

    fn dispatch(&mut self, loaded: BootResult<LoadedPlan<'_>>, mode: LaunchMode) -> BootError {
        match loaded {
            Ok(plan) => {
                let platform = self.platform;
                self.launcher.launch(&platform, plan, mode)
            }
            Err(e) => {
                log::error!("Boot failed: {}", e);
                self.launcher.set_state(LaunchState::Aborted);
                e
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mode_by_first_letter() {
        let config = BootConfig::default();
        assert_eq!(command_mode("BOOTLINUX", &config), LaunchMode::Direct);
        assert_eq!(command_mode("boot2", &config), LaunchMode::Direct);
        assert_eq!(
            command_mode("resumeintoboot", &config),
            LaunchMode::Resume {
                vector: PhysAddr::new(0xa004_0000),
                timeout_ms: 300_000,
            }
        );
        assert_eq!(command_mode("", &config), LaunchMode::Direct);
    }

    #[test]
    fn test_find_command_aliases() {
        assert_eq!(find_command("linux").map(|c| c.names[0]), Some("BOOTLINUX"));
        assert_eq!(find_command("Boot2").map(|c| c.names[0]), Some("BOOT2"));
        assert!(find_command("RESUMEINTOBOOT").is_some());
        assert!(find_command("HALT").is_none());
    }
}
