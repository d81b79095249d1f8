// Image load progress reporting

/// Receives byte progress while images are read into a plan.
///
/// `finish` is called exactly once after `begin`, on success and failure.
pub trait Progress {
    fn begin(&mut self, total_bytes: usize);
    fn advance(&mut self, bytes: usize);
    fn finish(&mut self);
}

/// Discards all progress.
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&mut self, _total_bytes: usize) {}
    fn advance(&mut self, _bytes: usize) {}
    fn finish(&mut self) {}
}

/// Logs every 10 percent.
#[derive(Debug, Default)]
pub struct LogProgress {
    total_bytes: usize,
    done_bytes: usize,
    last_step: usize,
}

impl LogProgress {
    pub const fn new() -> Self {
        Self {
            total_bytes: 0,
            done_bytes: 0,
            last_step: 0,
        }
    }

    /// Percentage read so far (0-100)
    pub fn percent(&self) -> usize {
        if self.total_bytes == 0 {
            return 0;
        }
        (self.done_bytes.saturating_mul(100) / self.total_bytes).min(100)
    }

    pub fn done_bytes(&self) -> usize {
        self.done_bytes
    }
}

impl Progress for LogProgress {
    fn begin(&mut self, total_bytes: usize) {
        self.total_bytes = total_bytes;
        self.done_bytes = 0;
        self.last_step = 0;
        log::info!("Loading {} bytes", total_bytes);
    }

    fn advance(&mut self, bytes: usize) {
        self.done_bytes = self.done_bytes.saturating_add(bytes);
        let step = self.percent() / 10;
        if step > self.last_step {
            self.last_step = step;
            log::info!("Loaded {}%", step * 10);
        }
    }

    fn finish(&mut self) {
        log::debug!("Load finished at {} of {} bytes", self.done_bytes, self.total_bytes);
    }
}
