// Global logging system for linboot
//
// Backend for the `log` facade. Entries are formatted once into a fixed
// stack buffer and kept in a bounded ring so the history survives until a
// console (or log file) is available to drain it. An optional sink mirrors
// every entry as it is recorded.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 64;

/// Bytes kept per entry. Longer messages are truncated.
pub const LOG_ENTRY_SIZE: usize = 192;

/// Sink receiving every entry as it is recorded.
pub type LogSink = fn(Level, &str);

/// One recorded log line.
#[derive(Clone, Copy)]
pub struct LogEntry {
    level: Level,
    len: usize,
    text: [u8; LOG_ENTRY_SIZE],
}

impl LogEntry {
    fn format(level: Level, args: fmt::Arguments<'_>) -> Self {
        let mut entry = Self {
            level,
            len: 0,
            text: [0; LOG_ENTRY_SIZE],
        };
        let _ = entry.write_fmt(args);
        entry
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        match core::str::from_utf8(&self.text[..self.len]) {
            Ok(s) => s,
            // Truncation may split a multi-byte character.
            Err(e) => core::str::from_utf8(&self.text[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl Write for LogEntry {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = LOG_ENTRY_SIZE - self.len;
        let to_copy = bytes.len().min(remaining);
        self.text[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}

/// Bounded history. The oldest entry is overwritten when full.
struct LogRing {
    entries: [Option<LogEntry>; MAX_LOG_ENTRIES],
    next: usize,
    stored: usize,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            entries: [None; MAX_LOG_ENTRIES],
            next: 0,
            stored: 0,
        }
    }

    fn push(&mut self, entry: LogEntry) {
        self.entries[self.next] = Some(entry);
        self.next = (self.next + 1) % MAX_LOG_ENTRIES;
        self.stored = (self.stored + 1).min(MAX_LOG_ENTRIES);
    }

    fn for_each(&self, mut f: impl FnMut(&LogEntry)) {
        let first = (self.next + MAX_LOG_ENTRIES - self.stored) % MAX_LOG_ENTRIES;
        for i in 0..self.stored {
            if let Some(entry) = &self.entries[(first + i) % MAX_LOG_ENTRIES] {
                f(entry);
            }
        }
    }

    fn clear(&mut self) {
        self.entries = [None; MAX_LOG_ENTRIES];
        self.next = 0;
        self.stored = 0;
    }
}

static LOG_BUFFER: Mutex<LogRing> = Mutex::new(LogRing::new());
static LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static SINK: Mutex<Option<LogSink>> = Mutex::new(None);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

struct BootLogger;

impl Log for BootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            log_args(record.level(), *record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: BootLogger = BootLogger;

/// Install the ring-buffer logger. Calling again only adjusts the level.
pub fn init(level: LevelFilter) {
    if !INITIALIZED.swap(true, Ordering::SeqCst) {
        let _ = log::set_logger(&LOGGER);
    }
    log::set_max_level(level);
}

/// Mirror every entry to `sink` (screen, serial, log file...).
pub fn set_sink(sink: LogSink) {
    *SINK.lock() = Some(sink);
}

pub fn clear_sink() {
    *SINK.lock() = None;
}

/// Record a message without going through the facade.
pub fn log(level: Level, message: &str) {
    log_args(level, format_args!("{}", message));
}

fn log_args(level: Level, args: fmt::Arguments<'_>) {
    let entry = LogEntry::format(level, args);
    LOG_BUFFER.lock().push(entry);
    LOG_COUNT.fetch_add(1, Ordering::SeqCst);

    // Copy the sink out so it never runs under the lock.
    let sink = *SINK.lock();
    if let Some(sink) = sink {
        sink(level, entry.message());
    }
}

/// Total entries recorded since start, including overwritten ones.
pub fn log_count() -> usize {
    LOG_COUNT.load(Ordering::SeqCst)
}

/// Visit retained entries, oldest first.
pub fn for_each_entry(f: impl FnMut(&LogEntry)) {
    LOG_BUFFER.lock().for_each(f);
}

pub fn clear() {
    LOG_BUFFER.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_truncates_long_messages() {
        let long = "x".repeat(LOG_ENTRY_SIZE * 2);
        let entry = LogEntry::format(Level::Info, format_args!("{}", long));
        assert_eq!(entry.message().len(), LOG_ENTRY_SIZE);
    }

    #[test]
    fn test_entry_truncation_keeps_utf8_valid() {
        let mut text = "a".repeat(LOG_ENTRY_SIZE - 1);
        text.push('é');
        let entry = LogEntry::format(Level::Warn, format_args!("{}", text));
        assert_eq!(entry.message().len(), LOG_ENTRY_SIZE - 1);
    }

    #[test]
    fn test_ring_keeps_newest_entries() {
        let mut ring = LogRing::new();
        for i in 0..MAX_LOG_ENTRIES + 3 {
            ring.push(LogEntry::format(Level::Debug, format_args!("line {}", i)));
        }

        let mut seen = Vec::new();
        ring.for_each(|e| seen.push(String::from(e.message())));
        assert_eq!(seen.len(), MAX_LOG_ENTRIES);
        assert_eq!(seen[0], "line 3");
        assert_eq!(seen[MAX_LOG_ENTRIES - 1], format!("line {}", MAX_LOG_ENTRIES + 2));
    }

    #[test]
    fn test_ring_clear() {
        let mut ring = LogRing::new();
        ring.push(LogEntry::format(Level::Error, format_args!("boom")));
        ring.clear();
        let mut count = 0;
        ring.for_each(|_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_facade_records_into_buffer() {
        init(LevelFilter::Debug);
        let before = log_count();
        log::info!(target: "screen", "Ready to boot. Please suspend/resume");
        assert!(log_count() > before);

        let mut found = false;
        for_each_entry(|e| {
            if e.message() == "Ready to boot. Please suspend/resume" {
                found = e.level() == Level::Info;
            }
        });
        assert!(found);
    }
}
