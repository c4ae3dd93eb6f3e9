//! Run progress tracking and periodic reporting.

use super::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Shared counters updated by workers, read by the reporter task.
#[derive(Debug)]
pub struct ProgressTracker {
    total_rows: AtomicU64,
    processed_rows: AtomicU64,
    error_count: AtomicU64,
    current_table: Mutex<String>,
    started: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            total_rows: AtomicU64::new(0),
            processed_rows: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            current_table: Mutex::new(String::new()),
            started: Instant::now(),
        }
    }

    pub fn set_total_rows(&self, total: u64) {
        self.total_rows.store(total, Ordering::Relaxed);
    }

    pub fn add_rows(&self, rows: u64) {
        self.processed_rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_current_table(&self, table: &str) {
        let mut current = self
            .current_table
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if *current != table {
            *current = table.to_string();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let processed = self.processed_rows.load(Ordering::Relaxed);
        let total = self.total_rows.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed();
        let rows_per_second = if elapsed.as_secs_f64() > 0.0 {
            processed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let eta = if rows_per_second > 0.0 && total > processed {
            Duration::from_secs_f64((total - processed) as f64 / rows_per_second)
        } else {
            Duration::ZERO
        };
        ProgressSnapshot {
            processed_rows: processed,
            total_rows: total,
            errors: self.error_count.load(Ordering::Relaxed),
            current_table: self
                .current_table
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            elapsed,
            rows_per_second,
            eta,
        }
    }
}

/// A point-in-time view of run progress.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub processed_rows: u64,
    pub total_rows: u64,
    pub errors: u64,
    pub current_table: String,
    pub elapsed: Duration,
    pub rows_per_second: f64,
    pub eta: Duration,
}

/// Log progress on an interval until shutdown or the pool finishes (the
/// caller aborts the task).
pub async fn report_progress(
    progress: Arc<ProgressTracker>,
    shutdown: Shutdown,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so the first report
    // carries real numbers.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if shutdown.is_cancelled() {
            return;
        }
        let snap = progress.snapshot();
        info!(
            current_table = %snap.current_table,
            processed_rows = snap.processed_rows,
            total_rows = snap.total_rows,
            rows_per_second = %format!("{:.2}", snap.rows_per_second),
            elapsed_secs = snap.elapsed.as_secs(),
            eta_secs = snap.eta.as_secs(),
            errors = snap.errors,
            "pipeline progress"
        );
    }
}
