//! Worker pool: submitter, workers, and result collector.
//!
//! Jobs and results flow through bounded channels sized to the worker
//! count; the bounded sink writer is the only other throughput governor.
//! The shutdown flag is observed at job receive, between rows, and by
//! the submitter before every send. Per-batch failures are logged and
//! counted without aborting the run; sink write failures are fatal and
//! trip the shutdown flag so the pool drains.

use super::batch::{fetch_rows, plan_jobs, BatchJob};
use super::progress::ProgressTracker;
use super::Shutdown;
use crate::catalog::Schema;
use crate::emit::{EmitError, RowEmitter, RowOutcome, SinkError};
use serde::Serialize;
use sqlx::mysql::MySqlPool;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Result of processing one batch window.
#[derive(Debug)]
pub struct BatchOutcome {
    pub table: String,
    pub processed_rows: u64,
    pub skipped_rows: u64,
    pub triples: u64,
    pub duration: Duration,
    pub error: Option<String>,
    /// Set when the failure was a sink write — unrecoverable.
    pub fatal: bool,
}

/// Aggregated counters for a data run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub processed_rows: u64,
    pub skipped_rows: u64,
    pub triples: u64,
    pub batches: u64,
    pub failed_batches: u64,
    pub write_failure: bool,
}

/// Everything a worker needs, cheap to clone per task.
#[derive(Clone)]
pub struct PoolContext {
    pub pool: MySqlPool,
    pub schema: Arc<Schema>,
    pub emitter: Arc<RowEmitter>,
    pub progress: Arc<ProgressTracker>,
    pub shutdown: Shutdown,
    pub query_timeout: Duration,
}

/// Checkpoint document written by the collector.
#[derive(Debug, Default, Serialize)]
struct Checkpoint {
    processed_rows: u64,
    total_rows: u64,
    tables: BTreeMap<String, u64>,
}

/// Run the pool over `tables` (schema-iteration order) and return the
/// aggregated stats once every job has drained.
pub async fn run_pool(
    ctx: PoolContext,
    tables: Vec<String>,
    workers: usize,
    batch_size: u64,
    checkpoint_interval: u64,
    checkpoint_path: Option<PathBuf>,
) -> RunStats {
    let (job_tx, job_rx) = mpsc::channel::<BatchJob>(workers.max(1));
    let (result_tx, result_rx) = mpsc::channel::<BatchOutcome>(workers.max(1));
    let job_rx = Arc::new(Mutex::new(job_rx));

    let submitter = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            for table_name in tables {
                let Some(table) = ctx.schema.table(&table_name) else {
                    warn!(table = %table_name, "table missing from snapshot, skipping");
                    continue;
                };
                for job in plan_jobs(table, batch_size) {
                    if ctx.shutdown.is_cancelled() {
                        info!("shutdown requested, no further jobs submitted");
                        return;
                    }
                    if job_tx.send(job).await.is_err() {
                        return;
                    }
                }
            }
            // job_tx drops here, closing the channel.
        })
    };

    let mut worker_handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let ctx = ctx.clone();
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        worker_handles.push(tokio::spawn(async move {
            loop {
                let job = {
                    let mut rx = job_rx.lock().await;
                    rx.recv().await
                };
                let Some(job) = job else {
                    break;
                };
                if ctx.shutdown.is_cancelled() {
                    debug!(worker_id, "dropping queued job after shutdown");
                    continue;
                }
                let outcome = process_batch(&ctx, &job).await;
                if outcome.error.is_some() {
                    ctx.progress.add_error();
                }
                if outcome.fatal {
                    ctx.shutdown.cancel();
                }
                if result_tx.send(outcome).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let collector = {
        let total_rows = ctx.schema.total_rows();
        tokio::spawn(collect_results(
            result_rx,
            total_rows,
            checkpoint_interval,
            checkpoint_path,
        ))
    };

    // Submitter and workers finish before the collector sees channel
    // close; join errors mean a panicked task and are worth surfacing.
    if let Err(e) = submitter.await {
        error!(error = %e, "submitter task panicked");
    }
    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "worker task panicked");
        }
    }
    match collector.await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "collector task panicked");
            RunStats::default()
        }
    }
}

async fn process_batch(ctx: &PoolContext, job: &BatchJob) -> BatchOutcome {
    let started = Instant::now();
    let mut outcome = BatchOutcome {
        table: job.table.clone(),
        processed_rows: 0,
        skipped_rows: 0,
        triples: 0,
        duration: Duration::ZERO,
        error: None,
        fatal: false,
    };

    let Some(table) = ctx.schema.table(&job.table) else {
        outcome.error = Some("table schema not found".to_string());
        outcome.duration = started.elapsed();
        return outcome;
    };

    ctx.progress.set_current_table(&job.table);

    let rows = match fetch_rows(&ctx.pool, table, job, ctx.query_timeout).await {
        Ok(rows) => rows,
        Err(e) => {
            outcome.error = Some(e.to_string());
            outcome.duration = started.elapsed();
            return outcome;
        }
    };

    for row in rows {
        if ctx.shutdown.is_cancelled() {
            break;
        }
        match ctx.emitter.emit_row(table, &row) {
            Ok(RowOutcome::Emitted(triples)) => {
                outcome.processed_rows += 1;
                outcome.triples += triples;
            }
            Ok(RowOutcome::Skipped) => {
                outcome.skipped_rows += 1;
            }
            Err(EmitError::Sink(SinkError::Finalized)) => {
                // Cancelled shutdown closed the sink under us; stop quietly.
                break;
            }
            Err(e) => {
                error!(table = %job.table, error = %e, "output write failed");
                outcome.error = Some(e.to_string());
                outcome.fatal = true;
                break;
            }
        }
    }

    ctx.progress.add_rows(outcome.processed_rows);
    outcome.duration = started.elapsed();
    outcome
}

async fn collect_results(
    mut result_rx: mpsc::Receiver<BatchOutcome>,
    total_rows: u64,
    checkpoint_interval: u64,
    checkpoint_path: Option<PathBuf>,
) -> RunStats {
    let mut stats = RunStats::default();
    let mut per_table: BTreeMap<String, u64> = BTreeMap::new();
    let mut rows_since_checkpoint = 0;

    while let Some(outcome) = result_rx.recv().await {
        stats.batches += 1;
        stats.processed_rows += outcome.processed_rows;
        stats.skipped_rows += outcome.skipped_rows;
        stats.triples += outcome.triples;
        *per_table.entry(outcome.table.clone()).or_default() += outcome.processed_rows;

        if let Some(message) = &outcome.error {
            stats.failed_batches += 1;
            if outcome.fatal {
                stats.write_failure = true;
            }
            error!(
                table = %outcome.table,
                error = %message,
                duration_ms = outcome.duration.as_millis() as u64,
                "batch failed"
            );
        } else {
            debug!(
                table = %outcome.table,
                rows = outcome.processed_rows,
                duration_ms = outcome.duration.as_millis() as u64,
                "batch processed"
            );
        }

        rows_since_checkpoint += outcome.processed_rows;
        if checkpoint_interval > 0 && rows_since_checkpoint >= checkpoint_interval {
            rows_since_checkpoint = 0;
            if let Some(path) = &checkpoint_path {
                let checkpoint = Checkpoint {
                    processed_rows: stats.processed_rows,
                    total_rows,
                    tables: per_table.clone(),
                };
                match serde_json::to_string_pretty(&checkpoint) {
                    Ok(json) => {
                        if let Err(e) = std::fs::write(path, json) {
                            warn!(error = %e, "failed to write checkpoint");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize checkpoint"),
                }
            }
        }
    }

    stats
}
