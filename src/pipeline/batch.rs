//! Batch reading: offset-window job planning and row fetching.
//!
//! Jobs within a table are planned in offset order but execute
//! independently — each window is a self-contained `LIMIT/OFFSET` query.
//! Columns are projected as `CAST(col AS CHAR)` in catalog order so
//! values reach the emitter as raw byte strings, with all typed
//! interpretation deferred to emission time.

use crate::catalog::Table;
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use std::time::Duration;
use thiserror::Error;

/// Batch read errors
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("query for {table} timed out after {seconds}s")]
    Timeout { table: String, seconds: u64 },
}

pub type BatchReadResult<T> = Result<T, BatchError>;

/// One offset window of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub table: String,
    pub offset: u64,
    pub limit: u64,
}

/// A fetched row: one raw value per projected column, in catalog order.
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Plan the offset windows for a table.
///
/// The row count is best-effort; when it is unknown (0) a single window
/// of `batch_size` is planned so the table is still scanned.
pub fn plan_jobs(table: &Table, batch_size: u64) -> Vec<BatchJob> {
    let total = table.row_count;
    if total == 0 {
        return vec![BatchJob {
            table: table.name.clone(),
            offset: 0,
            limit: batch_size,
        }];
    }

    let mut jobs = Vec::with_capacity((total / batch_size + 1) as usize);
    let mut offset = 0;
    while offset < total {
        let limit = batch_size.min(total - offset);
        jobs.push(BatchJob {
            table: table.name.clone(),
            offset,
            limit,
        });
        offset += batch_size;
    }
    jobs
}

/// Build the window query for a table: every column cast to CHAR, catalog
/// order, backtick-quoted identifiers.
pub fn select_sql(table: &Table, offset: u64, limit: u64) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("CAST(`{0}` AS CHAR) AS `{0}`", c.name))
        .collect();
    format!(
        "SELECT {} FROM `{}` LIMIT {} OFFSET {}",
        columns.join(", "),
        table.name,
        limit,
        offset
    )
}

/// Fetch one window of rows, bounded by the per-query timeout.
pub async fn fetch_rows(
    pool: &MySqlPool,
    table: &Table,
    job: &BatchJob,
    timeout: Duration,
) -> BatchReadResult<Vec<RawRow>> {
    let sql = select_sql(table, job.offset, job.limit);
    let fetched = tokio::time::timeout(timeout, sqlx::query(&sql).fetch_all(pool))
        .await
        .map_err(|_| BatchError::Timeout {
            table: table.name.clone(),
            seconds: timeout.as_secs(),
        })??;

    let mut rows = Vec::with_capacity(fetched.len());
    for row in fetched {
        let mut values = Vec::with_capacity(table.columns.len());
        for i in 0..table.columns.len() {
            values.push(row.try_get::<Option<Vec<u8>>, _>(i)?);
        }
        rows.push(values);
    }
    Ok(rows)
}
