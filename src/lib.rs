//! GraphShift — MySQL to Dgraph migration engine.
//!
//! Converts a relational database into RDF N-Quads plus a Dgraph schema,
//! preserving foreign-key relationships as graph edges:
//!
//! - **Relationship discovery**: declared foreign keys, naming-convention
//!   heuristics, and data-driven sampling merged into one
//!   conflict-resolved edge set.
//! - **Streaming conversion**: a bounded worker pool reads tables in
//!   offset windows, maps rows to stable blank-node identifiers, and
//!   writes forward/reverse edges through a chunked serial sink.
//! - **Schema synthesis**: predicate and type declarations with
//!   type-appropriate indexes, `@reverse`, and `@upsert` directives.
//! - **Validation**: output-file and orphan-free foreign-key checks.
//!
//! ## Example
//!
//! ```no_run
//! use graphshift::config::Config;
//! use graphshift::pipeline::Pipeline;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.mysql.database = "shop".to_string();
//!
//! let pipeline = Pipeline::connect(config).await?;
//! pipeline.run_full("").await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod dgraph;
pub mod emit;
pub mod logging;
pub mod pipeline;
pub mod rdf;
pub mod relations;
pub mod typemap;
pub mod validate;

pub use catalog::{CatalogError, Column, FkOrigin, ForeignKey, Index, Schema, SchemaReader, Table};
pub use config::{Config, ConfigError, LoggerConfig, MysqlConfig, OutputConfig, PipelineConfig};
pub use emit::{ChunkRecord, ChunkedSink, RowEmitter, SinkOptions, UidAllocator};
pub use pipeline::{Pipeline, PipelineError, RunOutcome, RunStats, Shutdown};
pub use relations::{Arbitration, ResolveError, ResolvedRelations};
pub use validate::{CheckResult, ValidationSummary, Validator};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
