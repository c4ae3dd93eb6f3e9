//! Integrity validation of a finished (or partial) migration.
//!
//! Three check families: required output files exist and are non-empty,
//! source row counts are covered by non-empty output, and every resolved
//! foreign key is orphan-free in the source. The summary is structured;
//! deciding whether failures are fatal is the caller's business.

use crate::catalog::{ForeignKey, Schema};
use crate::config::OutputConfig;
use crate::emit::{manifest_file_name, ChunkRecord};
use crate::relations::ResolvedRelations;
use sqlx::mysql::MySqlPool;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Validation errors (infrastructure, not check failures)
#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("validation query failed: {0}")]
    Query(#[from] sqlx::Error),
}

pub type ValidateResult<T> = Result<T, ValidateError>;

/// One validation check with its expected/actual evidence.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

/// All checks from one validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    checks: Vec<CheckResult>,
}

impl ValidationSummary {
    pub fn record(&mut self, check: CheckResult) {
        if check.passed {
            info!(check = %check.name, actual = %check.actual, "validation check passed");
        } else {
            warn!(
                check = %check.name,
                expected = %check.expected,
                actual = %check.actual,
                "validation check failed"
            );
        }
        self.checks.push(check);
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    pub fn total(&self) -> usize {
        self.checks.len()
    }

    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs validation checks against the source database and output files.
pub struct Validator {
    pool: MySqlPool,
    output: OutputConfig,
}

impl Validator {
    pub fn new(pool: MySqlPool, output: OutputConfig) -> Self {
        Self { pool, output }
    }

    /// Run all checks. Individual check failures land in the summary;
    /// only infrastructure problems (a dead connection) are errors.
    pub async fn run(
        &self,
        schema: &Schema,
        relations: &ResolvedRelations,
    ) -> ValidateResult<ValidationSummary> {
        let mut summary = ValidationSummary::default();

        self.check_output_files(&mut summary);
        self.check_row_coverage(schema, &mut summary);
        self.check_foreign_keys(relations, &mut summary).await;

        info!(
            total = summary.total(),
            passed = summary.passed(),
            failed = summary.failed(),
            "validation complete"
        );
        Ok(summary)
    }

    /// Output chunks (via the manifest), the schema file, and the mapping
    /// file exist and are non-empty. The mapping file is optional.
    fn check_output_files(&self, summary: &mut ValidationSummary) {
        let manifest_path = self
            .output
            .directory
            .join(manifest_file_name(&self.output.rdf_file));

        match read_manifest(&manifest_path) {
            Some(manifest) if !manifest.is_empty() => {
                let mut missing = Vec::new();
                let mut records = 0;
                for chunk in &manifest {
                    let path = self.output.directory.join(&chunk.filename);
                    if file_non_empty(&path) {
                        records += chunk.record_count;
                    } else {
                        missing.push(chunk.filename.clone());
                    }
                }
                summary.record(CheckResult {
                    name: "rdf chunks present".to_string(),
                    passed: missing.is_empty() && records > 0,
                    expected: format!("{} non-empty chunk file(s)", manifest.len()),
                    actual: if missing.is_empty() {
                        format!("{} chunk(s), {} record(s)", manifest.len(), records)
                    } else {
                        format!("missing or empty: {}", missing.join(", "))
                    },
                });
            }
            _ => {
                summary.record(CheckResult {
                    name: "rdf chunks present".to_string(),
                    passed: false,
                    expected: format!("manifest at {}", manifest_path.display()),
                    actual: "manifest missing or unreadable".to_string(),
                });
            }
        }

        summary.record(file_check(
            "schema file present",
            &self.output.schema_path(),
            true,
        ));
        summary.record(file_check(
            "mapping file present",
            &self.output.mapping_path(),
            false,
        ));
    }

    /// The source row total is recorded and the output carries records.
    fn check_row_coverage(&self, schema: &Schema, summary: &mut ValidationSummary) {
        let source_rows = schema.total_rows();
        let manifest_path = self
            .output
            .directory
            .join(manifest_file_name(&self.output.rdf_file));
        let output_records: u64 = read_manifest(&manifest_path)
            .map(|manifest| manifest.iter().map(|c| c.record_count).sum())
            .unwrap_or(0);

        summary.record(CheckResult {
            name: "row coverage".to_string(),
            passed: source_rows == 0 || output_records > 0,
            expected: format!("output records for {source_rows} source row(s)"),
            actual: format!("{output_records} output record(s)"),
        });
    }

    /// Every resolved relationship is orphan-free in the source.
    async fn check_foreign_keys(
        &self,
        relations: &ResolvedRelations,
        summary: &mut ValidationSummary,
    ) {
        for fk in relations.iter() {
            let sql = orphan_check_sql(fk);
            let name = format!(
                "fk integrity {}.{} -> {}.{}",
                fk.from_table, fk.from_column, fk.to_table, fk.to_column
            );
            match sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await {
                Ok(orphans) => summary.record(CheckResult {
                    name,
                    passed: orphans == 0,
                    expected: "0 orphaned reference(s)".to_string(),
                    actual: format!("{orphans} orphaned reference(s)"),
                }),
                Err(e) => {
                    warn!(check = %name, error = %e, "orphan check query failed");
                    summary.record(CheckResult {
                        name,
                        passed: false,
                        expected: "0 orphaned reference(s)".to_string(),
                        actual: format!("query failed: {e}"),
                    });
                }
            }
        }
    }
}

/// The orphan-detection query for one relationship: referencing rows
/// whose target key does not exist.
pub fn orphan_check_sql(fk: &ForeignKey) -> String {
    format!(
        "SELECT COUNT(*) FROM `{from}` t1 \
         LEFT JOIN `{to}` t2 ON t1.`{from_col}` = t2.`{to_col}` \
         WHERE t1.`{from_col}` IS NOT NULL AND t2.`{to_col}` IS NULL",
        from = fk.from_table,
        to = fk.to_table,
        from_col = fk.from_column,
        to_col = fk.to_column,
    )
}

fn file_non_empty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn file_check(name: &str, path: &Path, required: bool) -> CheckResult {
    let exists = file_non_empty(path);
    CheckResult {
        name: name.to_string(),
        passed: exists || !required,
        expected: format!("non-empty file at {}", path.display()),
        actual: if exists {
            "present".to_string()
        } else {
            "missing or empty".to_string()
        },
    }
}

fn read_manifest(path: &Path) -> Option<Vec<ChunkRecord>> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}
