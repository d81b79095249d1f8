//! Interrupt control guards
//!
//! The loader runs on a single core. The only concurrency it has to care
//! about is interrupt reentrancy while it patches memory other code may be
//! executing from (the resume vector), and the final launch where
//! interrupts must never come back.

use crate::cpu::Cpu;

/// RAII guard that disables interrupts and restores them on drop.
pub struct ControlGuard<'a, C: Cpu + ?Sized> {
    cpu: &'a C,
    was_enabled: bool,
}

impl<'a, C: Cpu + ?Sized> ControlGuard<'a, C> {
    /// Disable interrupts, returning a guard that restores them on drop.
    pub fn new(cpu: &'a C) -> Self {
        let was_enabled = cpu.disable_interrupts();
        Self { cpu, was_enabled }
    }

}

impl<C: Cpu + ?Sized> Drop for ControlGuard<'_, C> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.cpu.enable_interrupts();
        }
    }
}

/// Execute a closure with interrupts disabled.
pub fn without_interrupts<C, F, R>(cpu: &C, f: F) -> R
where
    C: Cpu + ?Sized,
    F: FnOnce() -> R,
{
    let _guard = ControlGuard::new(cpu);
    f()
}
