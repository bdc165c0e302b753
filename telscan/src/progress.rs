//! Minimal progress-reporting contract for long-running fan-outs.
//!
//! The reference implementation drives a full terminal progress bar; this
//! crate only needs the narrow contract the harness actually calls through,
//! so a caller can wire it to a real progress bar, a log line, or nothing.

/// Called once per completed probe (success or failure, completions are
/// indistinguishable to the sink) and once when the run finishes.
pub trait ProgressSink: Send + Sync {
    fn advance(&self);
    fn finish(&self);
}

/// Discards every event. The default when no progress reporting is wanted.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn advance(&self) {}
    fn finish(&self) {}
}

/// Logs one `tracing::info!` line per completion, at `total` granularity.
#[derive(Debug)]
pub struct LoggingProgress {
    total: usize,
    done: std::sync::atomic::AtomicUsize,
}

impl LoggingProgress {
    pub fn new(total: usize) -> Self {
        Self { total, done: std::sync::atomic::AtomicUsize::new(0) }
    }
}

impl ProgressSink for LoggingProgress {
    fn advance(&self) {
        let n = self.done.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        tracing::info!("{n}/{} complete", self.total);
    }

    fn finish(&self) {
        tracing::info!("scan finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_progress_accepts_any_number_of_events() {
        let p = NullProgress;
        p.advance();
        p.advance();
        p.finish();
    }

    #[test]
    fn logging_progress_counts_advances() {
        let p = LoggingProgress::new(3);
        p.advance();
        p.advance();
        assert_eq!(p.done.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
