use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the collector.
///
/// Purpose:
/// - Track run and per-source outcomes
/// - Track records written and dropped
/// - Track HTTP attempts and retries
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Runs
    pub runs_completed: AtomicUsize,

    // Sources
    pub sources_succeeded: AtomicUsize,
    pub sources_skipped: AtomicUsize,
    pub sources_failed: AtomicUsize,

    // Records
    pub records_written: AtomicUsize,
    pub records_dropped: AtomicUsize,

    // HTTP
    pub http_attempts: AtomicUsize,
    pub http_retries: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line, low-noise report.
    pub fn report(&self) -> String {
        format!(
            "runs={} ok={} skipped={} failed={} written={} dropped={} http_attempts={} http_retries={}",
            self.runs_completed.load(Ordering::Relaxed),
            self.sources_succeeded.load(Ordering::Relaxed),
            self.sources_skipped.load(Ordering::Relaxed),
            self.sources_failed.load(Ordering::Relaxed),
            self.records_written.load(Ordering::Relaxed),
            self.records_dropped.load(Ordering::Relaxed),
            self.http_attempts.load(Ordering::Relaxed),
            self.http_retries.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
