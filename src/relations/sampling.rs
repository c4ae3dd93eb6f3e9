//! Data-driven foreign-key confirmation.
//!
//! For a candidate column, sample up to K distinct non-null values and
//! measure what fraction of them exist among each plausible target
//! table's key values. A high ratio is strong evidence of a relationship
//! the catalog never declared and the naming conventions cannot see
//! (e.g. `content_id` values that all live in `metas.id`).

use crate::catalog::{ForeignKey, Schema, Table};
use sqlx::mysql::MySqlPool;
use tracing::{debug, warn};

/// Default number of distinct values sampled per candidate column.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Minimum match ratio for a sampled candidate to be retained.
pub const ACCEPT_RATIO: f64 = 0.5;

/// Match ratio above which a sampled candidate overrides a
/// convention-inferred one.
pub const OVERRIDE_RATIO: f64 = 0.8;

/// Outcome of sampling one candidate column against one target table.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub target: String,
    pub target_column: String,
    pub ratio: f64,
    pub sampled: usize,
}

/// Sample `table.column` and return the best-matching target as a
/// data-origin [`ForeignKey`], or `None` when no target reaches
/// [`ACCEPT_RATIO`].
///
/// Plausible targets are all tables with a usable key column. Ties go to
/// the lexically first table (snapshot iteration order), keeping the
/// result deterministic.
pub async fn sample_candidate(
    pool: &MySqlPool,
    schema: &Schema,
    table: &str,
    column: &str,
    sample_size: usize,
) -> Result<Option<ForeignKey>, sqlx::Error> {
    let values = sample_values(pool, table, column, sample_size).await?;
    if values.is_empty() {
        debug!(table, column, "no non-null values to sample");
        return Ok(None);
    }

    let mut best: Option<SampleOutcome> = None;
    for (name, target) in &schema.tables {
        let Some(key) = target.key_column() else {
            continue;
        };
        let matched = match count_matches(pool, target, key, &values).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!(table, column, target = %name, error = %e, "sampling probe failed");
                continue;
            }
        };
        let ratio = matched as f64 / values.len() as f64;
        debug!(table, column, target = %name, ratio, "sampled candidate target");

        let better = match &best {
            Some(current) => ratio > current.ratio,
            None => true,
        };
        if better && ratio >= ACCEPT_RATIO {
            best = Some(SampleOutcome {
                target: name.clone(),
                target_column: key.to_string(),
                ratio,
                sampled: values.len(),
            });
        }
    }

    Ok(best.map(|outcome| {
        ForeignKey::sampled(
            table,
            column,
            outcome.target,
            outcome.target_column,
            outcome.ratio,
        )
    }))
}

async fn sample_values(
    pool: &MySqlPool,
    table: &str,
    column: &str,
    limit: usize,
) -> Result<Vec<String>, sqlx::Error> {
    let sql = format!(
        "SELECT DISTINCT CAST(`{column}` AS CHAR) FROM `{table}` \
         WHERE `{column}` IS NOT NULL LIMIT {limit}"
    );
    let values: Vec<Option<String>> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
    Ok(values.into_iter().flatten().collect())
}

async fn count_matches(
    pool: &MySqlPool,
    target: &Table,
    key: &str,
    values: &[String],
) -> Result<u64, sqlx::Error> {
    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(DISTINCT `{key}`) FROM `{table}` \
         WHERE CAST(`{key}` AS CHAR) IN ({placeholders})",
        table = target.name,
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for value in values {
        query = query.bind(value);
    }
    let count = query.fetch_one(pool).await?;
    Ok(count.max(0) as u64)
}
