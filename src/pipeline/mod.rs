//! Migration pipeline orchestration.
//!
//! Modes compose the same stages: catalog read → relationship resolution
//! → (data streaming through the worker pool and chunked sink) → schema
//! synthesis → validation. Each stage consumes only the previous stage's
//! products; the shutdown flag is the one piece of cross-cutting state.

mod batch;
mod progress;
mod workers;

pub use batch::{plan_jobs, select_sql, BatchError, BatchJob, RawRow};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use workers::{BatchOutcome, PoolContext, RunStats};

use crate::catalog::{CatalogError, Schema, SchemaReader};
use crate::config::Config;
use crate::dgraph;
use crate::emit::{ChunkedSink, RowEmitter, SinkError, SinkOptions, UidAllocator, UidError};
use crate::relations::{self, ResolveError, ResolvedRelations};
use crate::validate::{ValidateError, ValidationSummary, Validator};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to connect to MySQL at {host}/{database}: {source}")]
    Connect {
        host: String,
        database: String,
        source: sqlx::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Mapping(#[from] UidError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error("schema file write failed: {0}")]
    SchemaWrite(#[from] std::io::Error),

    #[error("output write failed during data streaming")]
    Write,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Cooperative run-level cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a data run ended. Cancellation is an outcome, not an error:
/// partial outputs are finalized and valid.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunStats),
    Cancelled(RunStats),
}

impl RunOutcome {
    pub fn stats(&self) -> &RunStats {
        match self {
            RunOutcome::Completed(stats) | RunOutcome::Cancelled(stats) => stats,
        }
    }
}

/// The migration engine.
pub struct Pipeline {
    config: Config,
    pool: MySqlPool,
    shutdown: Shutdown,
    progress: Arc<ProgressTracker>,
}

impl Pipeline {
    /// Connect to MySQL and verify the connection.
    pub async fn connect(config: Config) -> PipelineResult<Self> {
        let mysql = &config.mysql;
        let pool = MySqlPoolOptions::new()
            .max_connections(mysql.max_connections)
            .acquire_timeout(mysql.query_timeout())
            .idle_timeout(Duration::from_secs(mysql.conn_max_idle_time))
            .max_lifetime(Duration::from_secs(mysql.conn_max_lifetime))
            .connect(&mysql.connection_url())
            .await
            .map_err(|source| PipelineError::Connect {
                host: mysql.host.clone(),
                database: mysql.database.clone(),
                source,
            })?;

        // A cheap ping surfaces auth problems before any stage starts.
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|source| PipelineError::Connect {
                host: mysql.host.clone(),
                database: mysql.database.clone(),
                source,
            })?;

        info!(host = %mysql.host, database = %mysql.database, "connected to MySQL");

        Ok(Self {
            config,
            pool,
            shutdown: Shutdown::new(),
            progress: Arc::new(ProgressTracker::new()),
        })
    }

    /// Handle for signal handlers to request cancellation.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the catalog snapshot.
    pub async fn extract_schema(&self) -> PipelineResult<Schema> {
        let reader = SchemaReader::new(self.pool.clone());
        let schema = reader.read(&self.config.mysql.database).await?;
        Ok(schema)
    }

    /// Resolve the authoritative relationship set.
    pub async fn resolve_relations(&self, schema: &Schema) -> PipelineResult<ResolvedRelations> {
        let resolved =
            relations::resolve(&self.pool, schema, self.config.pipeline.sample_size).await?;
        Ok(resolved)
    }

    /// Schema mode: snapshot, resolve, synthesize, write.
    pub async fn run_schema(&self) -> PipelineResult<()> {
        let schema = self.extract_schema().await?;
        let resolved = self.resolve_relations(&schema).await?;
        let document = dgraph::synthesize(&schema, &resolved);

        if self.config.pipeline.dry_run {
            info!(
                predicates = document.lines().filter(|l| l.contains(": ")).count(),
                "dry run: schema not written"
            );
            return Ok(());
        }

        std::fs::create_dir_all(&self.config.output.directory)?;
        let path = self.config.output.schema_path();
        std::fs::write(&path, document)?;
        info!(path = %path.display(), "Dgraph schema written");
        Ok(())
    }

    /// Data mode: stream all (or the allowlisted) tables to chunked RDF.
    pub async fn run_data(&self, tables: &str) -> PipelineResult<RunOutcome> {
        let schema = self.extract_schema().await?;
        let resolved = self.resolve_relations(&schema).await?;
        self.stream_data(&schema, resolved, tables).await
    }

    /// Full mode: data first (relationships inform the edges), then the
    /// schema document, then validation unless skipped.
    pub async fn run_full(&self, tables: &str) -> PipelineResult<RunOutcome> {
        let schema = self.extract_schema().await?;
        let resolved = self.resolve_relations(&schema).await?;

        let outcome = self
            .stream_data(&schema, resolved.clone(), tables)
            .await?;
        if let RunOutcome::Cancelled(_) = outcome {
            return Ok(outcome);
        }

        let document = dgraph::synthesize(&schema, &resolved);
        if !self.config.pipeline.dry_run {
            std::fs::create_dir_all(&self.config.output.directory)?;
            let path = self.config.output.schema_path();
            std::fs::write(&path, document)?;
            info!(path = %path.display(), "Dgraph schema written");
        }

        if self.config.pipeline.skip_validation || self.config.pipeline.dry_run {
            info!("validation skipped");
        } else {
            let summary = self.validate(&schema, &resolved).await?;
            if summary.failed() > 0 {
                warn!(
                    failed = summary.failed(),
                    total = summary.total(),
                    "validation reported failures"
                );
            }
        }

        Ok(outcome)
    }

    /// Validate mode.
    pub async fn run_validate(&self) -> PipelineResult<ValidationSummary> {
        let schema = self.extract_schema().await?;
        let resolved = self.resolve_relations(&schema).await?;
        self.validate(&schema, &resolved).await
    }

    async fn validate(
        &self,
        schema: &Schema,
        resolved: &ResolvedRelations,
    ) -> PipelineResult<ValidationSummary> {
        let validator = Validator::new(self.pool.clone(), self.config.output.clone());
        let summary = validator.run(schema, resolved).await?;
        Ok(summary)
    }

    async fn stream_data(
        &self,
        schema: &Schema,
        resolved: ResolvedRelations,
        tables: &str,
    ) -> PipelineResult<RunOutcome> {
        let selected = select_tables(schema, tables);
        if selected.is_empty() {
            warn!("no tables selected for data migration");
            return Ok(RunOutcome::Completed(RunStats::default()));
        }

        let schema = Arc::new(schema.clone());
        let total_rows: u64 = selected
            .iter()
            .filter_map(|name| schema.table(name))
            .map(|t| t.row_count)
            .sum();
        self.progress.set_total_rows(total_rows);

        info!(
            tables = selected.len(),
            total_rows,
            workers = self.config.pipeline.workers,
            batch_size = self.config.pipeline.batch_size,
            dry_run = self.config.pipeline.dry_run,
            "starting data streaming"
        );

        let sink = Arc::new(ChunkedSink::create(SinkOptions {
            directory: self.config.output.directory.clone(),
            rdf_file: self.config.output.rdf_file.clone(),
            chunk_threshold: self.config.pipeline.chunk_record_threshold,
            dry_run: self.config.pipeline.dry_run,
        })?);
        let uids = Arc::new(UidAllocator::new());
        let emitter = Arc::new(RowEmitter::new(
            Arc::new(resolved),
            Arc::clone(&uids),
            Arc::clone(&sink),
        ));

        let reporter = tokio::spawn(progress::report_progress(
            Arc::clone(&self.progress),
            self.shutdown.clone(),
            Duration::from_secs(self.config.pipeline.progress_report_interval.max(1)),
        ));

        let checkpoint_path = if self.config.pipeline.dry_run {
            None
        } else {
            Some(self.config.output.checkpoint_path())
        };

        let stats = workers::run_pool(
            PoolContext {
                pool: self.pool.clone(),
                schema: Arc::clone(&schema),
                emitter,
                progress: Arc::clone(&self.progress),
                shutdown: self.shutdown.clone(),
                query_timeout: self.config.mysql.query_timeout(),
            },
            selected,
            self.config.pipeline.workers,
            self.config.pipeline.batch_size,
            self.config.pipeline.checkpoint_interval,
            checkpoint_path,
        )
        .await;

        reporter.abort();

        // Finalize output and persist the identifier map even on the
        // cancelled and failed paths: partial outputs stay loadable.
        let manifest = sink.finalize()?;
        if !self.config.pipeline.dry_run {
            let surrogates = schema.surrogate_key_tables();
            uids.persist(&self.config.output.mapping_path(), &surrogates)?;
        }

        info!(
            rows = stats.processed_rows,
            skipped = stats.skipped_rows,
            triples = stats.triples,
            chunks = manifest.len(),
            failed_batches = stats.failed_batches,
            "data streaming finished"
        );

        if stats.write_failure {
            return Err(PipelineError::Write);
        }

        if self.shutdown.is_cancelled() {
            Ok(RunOutcome::Cancelled(stats))
        } else {
            Ok(RunOutcome::Completed(stats))
        }
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Filter the comma-separated allowlist against the snapshot; empty means
/// every table, in snapshot (sorted) order.
pub fn select_tables(schema: &Schema, tables: &str) -> Vec<String> {
    if tables.trim().is_empty() {
        return schema.tables.keys().cloned().collect();
    }

    let mut selected = Vec::new();
    for name in tables.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if schema.tables.contains_key(name) {
            selected.push(name.to_string());
        } else {
            warn!(table = %name, "requested table not found in schema");
        }
    }
    selected
}
