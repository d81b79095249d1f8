//! Boot variables
//!
//! The handful of user-settable values the loader reads when a boot command
//! runs: image names, kernel command line, boot animation delay, machine
//! override and the resume-vector hook parameters. Scripts set them by
//! name, so each field is also reachable through [`BootConfig::set`] and
//! [`BootConfig::get`] using the names in [`VARIABLES`].

use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;

/// Value type of a boot variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Str,
    Int,
}

/// Registration entry for one boot variable.
#[derive(Debug, Clone, Copy)]
pub struct VarInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: VarKind,
}

/// All variables understood by [`BootConfig`].
pub static VARIABLES: &[VarInfo] = &[
    VarInfo {
        name: "KERNEL",
        description: "Linux kernel file name",
        kind: VarKind::Str,
    },
    VarInfo {
        name: "INITRD",
        description: "Linux initial ram disk file name",
        kind: VarKind::Str,
    },
    VarInfo {
        name: "CMDLINE",
        description: "Arguments to pass to the Linux kernel",
        kind: VarKind::Str,
    },
    VarInfo {
        name: "BOOTSPD",
        description: "Delay to wait for boot animation",
        kind: VarKind::Int,
    },
    VarInfo {
        name: "MTYPE",
        description: "Machine type to report to the kernel (0 = machine default)",
        kind: VarKind::Int,
    },
    VarInfo {
        name: "RESUMEADDR",
        description: "Physical address of the suspend/resume vector",
        kind: VarKind::Int,
    },
    VarInfo {
        name: "RESUMETIMEOUT",
        description: "Milliseconds to wait for a suspend/resume cycle",
        kind: VarKind::Int,
    },
];

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No variable with this name
    UnknownVariable,
    /// Integer value is neither decimal nor 0x-prefixed hex
    InvalidNumber,
}

impl ConfigError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigError::UnknownVariable => "Unknown variable",
            ConfigError::InvalidNumber => "Invalid number",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    pub kernel: String,
    /// Empty means boot without an initrd.
    pub initrd: String,
    pub cmdline: String,
    pub boot_speed: u32,
    /// Zero selects the active machine's default.
    pub machine_type: u32,
    pub resume_vector: u32,
    pub resume_timeout_ms: u32,
}

pub const DEFAULT_RESUME_VECTOR: u32 = 0xa004_0000;
pub const DEFAULT_RESUME_TIMEOUT_MS: u32 = 300_000;

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            kernel: String::from("zimage"),
            initrd: String::from("initrd"),
            cmdline: String::from("root=/dev/ram0 ro console=tty0"),
            boot_speed: 5,
            machine_type: 0,
            resume_vector: DEFAULT_RESUME_VECTOR,
            resume_timeout_ms: DEFAULT_RESUME_TIMEOUT_MS,
        }
    }
}

impl BootConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable by name (case-insensitive).
    pub fn lookup(name: &str) -> Option<&'static VarInfo> {
        VARIABLES
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Assign a variable from its textual form.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let info = Self::lookup(name).ok_or(ConfigError::UnknownVariable)?;
        if info.kind == VarKind::Str {
            *self.str_field(info.name)? = value.to_string();
        } else {
            *self.int_field(info.name)? = parse_u32(value)?;
        }
        Ok(())
    }

    /// Render a variable's current value.
    pub fn get(&self, name: &str) -> Result<String, ConfigError> {
        let info = Self::lookup(name).ok_or(ConfigError::UnknownVariable)?;
        let rendered = match info.name {
            "KERNEL" => self.kernel.clone(),
            "INITRD" => self.initrd.clone(),
            "CMDLINE" => self.cmdline.clone(),
            "BOOTSPD" => format!("{}", self.boot_speed),
            "MTYPE" => format!("{}", self.machine_type),
            "RESUMEADDR" => format!("{:#010x}", self.resume_vector),
            "RESUMETIMEOUT" => format!("{}", self.resume_timeout_ms),
            _ => return Err(ConfigError::UnknownVariable),
        };
        Ok(rendered)
    }

    /// Initrd name to load, `None` when booting without one.
    pub fn initrd_name(&self) -> Option<&str> {
        if self.initrd.is_empty() {
            None
        } else {
            Some(&self.initrd)
        }
    }

    fn str_field(&mut self, name: &str) -> Result<&mut String, ConfigError> {
        match name {
            "KERNEL" => Ok(&mut self.kernel),
            "INITRD" => Ok(&mut self.initrd),
            "CMDLINE" => Ok(&mut self.cmdline),
            _ => Err(ConfigError::UnknownVariable),
        }
    }

    fn int_field(&mut self, name: &str) -> Result<&mut u32, ConfigError> {
        match name {
            "BOOTSPD" => Ok(&mut self.boot_speed),
            "MTYPE" => Ok(&mut self.machine_type),
            "RESUMEADDR" => Ok(&mut self.resume_vector),
            "RESUMETIMEOUT" => Ok(&mut self.resume_timeout_ms),
            _ => Err(ConfigError::UnknownVariable),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub fn parse_u32(value: &str) -> Result<u32, ConfigError> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|_| ConfigError::InvalidNumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BootConfig::default();
        assert_eq!(cfg.kernel, "zimage");
        assert_eq!(cfg.initrd_name(), Some("initrd"));
        assert_eq!(cfg.cmdline, "root=/dev/ram0 ro console=tty0");
        assert_eq!(cfg.boot_speed, 5);
        assert_eq!(cfg.machine_type, 0);
        assert_eq!(cfg.resume_vector, 0xa004_0000);
        assert_eq!(cfg.resume_timeout_ms, 300_000);
    }

    #[test]
    fn test_set_is_case_insensitive() {
        let mut cfg = BootConfig::new();
        cfg.set("kernel", "zImage-2.6.25").unwrap();
        cfg.set("Mtype", "1234").unwrap();
        assert_eq!(cfg.kernel, "zImage-2.6.25");
        assert_eq!(cfg.machine_type, 1234);
    }

    #[test]
    fn test_set_hex_and_get() {
        let mut cfg = BootConfig::new();
        cfg.set("RESUMEADDR", "0xA0041000").unwrap();
        assert_eq!(cfg.resume_vector, 0xa004_1000);
        assert_eq!(cfg.get("resumeaddr").unwrap(), "0xa0041000");
    }

    #[test]
    fn test_empty_initrd_means_none() {
        let mut cfg = BootConfig::new();
        cfg.set("INITRD", "").unwrap();
        assert_eq!(cfg.initrd_name(), None);
    }

    #[test]
    fn test_errors() {
        let mut cfg = BootConfig::new();
        assert_eq!(cfg.set("NOPE", "1"), Err(ConfigError::UnknownVariable));
        assert_eq!(cfg.set("BOOTSPD", "fast"), Err(ConfigError::InvalidNumber));
        assert_eq!(cfg.set("MTYPE", "0xZZ"), Err(ConfigError::InvalidNumber));
        assert_eq!(cfg.boot_speed, 5);
    }

    #[test]
    fn test_every_variable_is_readable() {
        let cfg = BootConfig::new();
        for var in VARIABLES {
            assert!(cfg.get(var.name).is_ok(), "{}", var.name);
        }
    }
}
