//! Blocking delays.

/// Source of blocking waits.
pub trait Clock {
    fn sleep_ms(&self, ms: u32);
}
