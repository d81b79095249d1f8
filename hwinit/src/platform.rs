//! Machine abstraction and registry.
//!
//! Every supported device family provides one [`Machine`] implementation.
//! The registry is a static table scanned once at startup; the first entry
//! whose `detect` accepts the host's identification strings wins.
//!
//! # Boot-time contract
//!
//! ```text
//!   pre_hardware_shutdown()   may fail, nothing touched yet
//!        │
//!   interrupts off            point of no return
//!        │
//!   hardware_shutdown()       quiesce DMA, USB, LCD...; flush caches
//!        │
//!   MMU trampoline
//! ```

use core::fmt;

use linboot_core::PhysAddr;
use spin::Once;

use crate::cpu::cache::CacheFlavor;
use crate::mach::{GenericArm, Msm7xxx, Msm7xxxA, Qsd8xxx, Rx3715};

// ═══════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Identification strings reported by the host environment.
#[derive(Debug, Clone, Copy)]
pub struct PlatformId<'a> {
    /// Processor name (e.g. "MSM7201A").
    pub cpu: &'a str,
    /// OEM device string (e.g. "HP iPAQ rx3700").
    pub oem: &'a str,
}

/// Failure of a machine's pre-shutdown hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownError {
    /// A resource the shutdown sequence needs could not be obtained
    ResourceUnavailable(&'static str),
    /// A device refused to stop
    DeviceBusy(&'static str),
}

impl ShutdownError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownError::ResourceUnavailable(_) => "Resource unavailable",
            ShutdownError::DeviceBusy(_) => "Device busy",
        }
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownError::ResourceUnavailable(what) | ShutdownError::DeviceBusy(what) => {
                write!(f, "{}: {}", self.as_str(), what)
            }
        }
    }
}

/// Per-device-family behavior needed to boot Linux.
pub trait Machine: Sync {
    fn name(&self) -> &'static str;

    /// Linux machine number; 0 when the family has no single answer.
    fn machine_type(&self) -> u32;

    fn ram_base(&self) -> PhysAddr;

    fn default_ram_size(&self) -> u32;

    fn cache_flavor(&self) -> CacheFlavor;

    fn flush_cache(&self) {
        self.cache_flavor().flush();
    }

    /// Last chance to fail before interrupts go off.
    fn pre_hardware_shutdown(&self) -> Result<(), ShutdownError> {
        Ok(())
    }

    /// Quiesce devices. Runs with interrupts disabled.
    fn hardware_shutdown(&self) {
        self.flush_cache();
    }

    /// Whether the LCD keeps scanning out during the relocation copy.
    fn framebuffer_active_during_boot(&self) -> bool {
        true
    }

    fn detect(&self, id: &PlatformId<'_>) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

static MSM7XXXA: Msm7xxxA = Msm7xxxA;
static MSM7XXX: Msm7xxx = Msm7xxx;
static QSD8XXX: Qsd8xxx = Qsd8xxx;
static RX3715: Rx3715 = Rx3715;
static GENERIC: GenericArm = GenericArm;

/// Known machines, most specific first. The generic entry accepts anything.
pub static MACHINES: &[&'static dyn Machine] = &[&MSM7XXXA, &MSM7XXX, &QSD8XXX, &RX3715, &GENERIC];

static ACTIVE: Once<&'static dyn Machine> = Once::new();

/// First registered machine accepting `id`.
pub fn detect_machine(id: &PlatformId<'_>) -> &'static dyn Machine {
    MACHINES
        .iter()
        .copied()
        .find(|m| m.detect(id))
        .unwrap_or(&GENERIC)
}

/// Resolve the active machine. Later calls return the first answer.
pub fn init_machine(id: &PlatformId<'_>) -> &'static dyn Machine {
    *ACTIVE.call_once(|| {
        let machine = detect_machine(id);
        log::info!(
            "Detected machine {} (cpu '{}', oem '{}')",
            machine.name(),
            id.cpu,
            id.oem
        );
        machine
    })
}

/// The active machine, if [`init_machine`] ran.
pub fn machine() -> Option<&'static dyn Machine> {
    ACTIVE.get().copied()
}

/// Case-insensitive prefix match used by the detectors.
pub(crate) fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
