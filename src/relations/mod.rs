//! Relationship resolver: the authoritative foreign-key set.
//!
//! Three candidate sources are merged in strict priority order: keys
//! declared in the catalog (confidence 1.0), naming-convention inferences
//! (0.6), and data-sampled confirmations (observed match ratio). The
//! result has exactly one target per `(from_table, from_column)`, every
//! target table exists in the snapshot, and no entry is duplicated.

mod convention;
mod sampling;

pub use convention::{candidate_base, convention_target, detect_common_prefixes, name_forms};
pub use sampling::{sample_candidate, ACCEPT_RATIO, DEFAULT_SAMPLE_SIZE, OVERRIDE_RATIO};

use crate::catalog::{FkOrigin, ForeignKey, Schema};
use sqlx::mysql::MySqlPool;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resolver errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Sampling query failed
    #[error("relationship sampling failed: {0}")]
    Sampling(#[from] sqlx::Error),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// What to do with an existing entry when a new candidate arrives for the
/// same `(from_table, from_column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    Keep,
    Replace,
}

/// Strict priority function for conflicting candidates.
///
/// Declared keys are never overridden. A data-sampled candidate replaces
/// a convention-inferred entry only when its observed ratio exceeds
/// [`OVERRIDE_RATIO`]. Everything else keeps the existing entry, so
/// insertion order (declared, convention, data) settles the rest.
pub fn arbitrate(existing: &ForeignKey, candidate: &ForeignKey) -> Arbitration {
    match (existing.origin, candidate.origin) {
        (FkOrigin::Declared, _) => Arbitration::Keep,
        (_, FkOrigin::Declared) => Arbitration::Replace,
        (FkOrigin::Convention, FkOrigin::Data) if candidate.confidence > OVERRIDE_RATIO => {
            Arbitration::Replace
        }
        _ => Arbitration::Keep,
    }
}

/// The conflict-resolved foreign-key set.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRelations {
    entries: BTreeMap<(String, String), ForeignKey>,
}

impl ResolvedRelations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the relationship for a referencing column.
    pub fn get(&self, from_table: &str, from_column: &str) -> Option<&ForeignKey> {
        self.entries
            .get(&(from_table.to_string(), from_column.to_string()))
    }

    /// All relationships in deterministic `(table, column)` order.
    pub fn iter(&self) -> impl Iterator<Item = &ForeignKey> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a candidate, applying the arbitration rule on conflict.
    /// Returns true when the candidate ended up in the set.
    pub fn insert(&mut self, candidate: ForeignKey) -> bool {
        let key = (candidate.from_table.clone(), candidate.from_column.clone());
        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, candidate);
                true
            }
            Some(existing) => match arbitrate(existing, &candidate) {
                Arbitration::Keep => {
                    debug!(
                        table = %key.0,
                        column = %key.1,
                        kept = %existing.to_table,
                        rejected = %candidate.to_table,
                        "kept existing relationship"
                    );
                    false
                }
                Arbitration::Replace => {
                    info!(
                        table = %key.0,
                        column = %key.1,
                        old_target = %existing.to_table,
                        new_target = %candidate.to_table,
                        ratio = candidate.confidence,
                        "data-sampled relationship overrides heuristic"
                    );
                    self.entries.insert(key, candidate);
                    true
                }
            },
        }
    }
}

/// Merge candidate lists without touching the database. Candidates whose
/// target table is missing from the snapshot are dropped with a warning.
pub fn merge(
    schema: &Schema,
    declared: Vec<ForeignKey>,
    convention: Vec<ForeignKey>,
    sampled: Vec<ForeignKey>,
) -> ResolvedRelations {
    let mut resolved = ResolvedRelations::new();
    for candidate in declared
        .into_iter()
        .chain(convention)
        .chain(sampled)
    {
        if !schema.tables.contains_key(&candidate.to_table) {
            warn!(
                table = %candidate.from_table,
                column = %candidate.from_column,
                target = %candidate.to_table,
                "dropping relationship: target table not in snapshot"
            );
            continue;
        }
        resolved.insert(candidate);
    }
    resolved
}

/// Convention candidates for every table column not already covered by a
/// declared key.
pub fn convention_candidates(schema: &Schema, covered: &ResolvedRelations) -> Vec<ForeignKey> {
    let mut candidates = Vec::new();
    for (table_name, table) in &schema.tables {
        for column in &table.columns {
            if covered.get(table_name, &column.name).is_some() {
                continue;
            }
            if let Some(target) = convention_target(schema, table_name, &column.name) {
                let to_column = schema
                    .table(&target)
                    .and_then(|t| t.key_column())
                    .unwrap_or("id")
                    .to_string();
                info!(
                    table = %table_name,
                    column = %column.name,
                    target = %target,
                    "detected relationship by naming convention"
                );
                candidates.push(ForeignKey::convention(
                    table_name.as_str(),
                    column.name.as_str(),
                    target,
                    to_column,
                ));
            }
        }
    }
    candidates
}

/// Run the full resolution pass: declared keys, convention candidates,
/// then data sampling for every candidate column not pinned by a
/// declared key.
pub async fn resolve(
    pool: &MySqlPool,
    schema: &Schema,
    sample_size: usize,
) -> ResolveResult<ResolvedRelations> {
    let mut declared_set = ResolvedRelations::new();
    for fk in &schema.declared_foreign_keys {
        if schema.tables.contains_key(&fk.to_table) {
            declared_set.insert(fk.clone());
        } else {
            warn!(
                table = %fk.from_table,
                column = %fk.from_column,
                target = %fk.to_table,
                "declared key references a table outside the snapshot"
            );
        }
    }

    let convention = convention_candidates(schema, &declared_set);

    // Sample every candidate-shaped column not already settled by a
    // declared key; a high ratio may override the convention choice.
    let mut sampled = Vec::new();
    for (table_name, table) in &schema.tables {
        for column in &table.columns {
            if candidate_base(&column.name).is_none() {
                continue;
            }
            if declared_set.get(table_name, &column.name).is_some() {
                continue;
            }
            match sample_candidate(pool, schema, table_name, &column.name, sample_size).await {
                Ok(Some(fk)) => sampled.push(fk),
                Ok(None) => debug!(
                    table = %table_name,
                    column = %column.name,
                    "sampling found no target above the accept ratio"
                ),
                Err(e) => warn!(
                    table = %table_name,
                    column = %column.name,
                    error = %e,
                    "sampling failed for candidate column"
                ),
            }
        }
    }

    let declared: Vec<ForeignKey> = declared_set.iter().cloned().collect();
    let resolved = merge(schema, declared, convention, sampled);

    // Anything that looked like a reference but found no home is worth an
    // operator's attention.
    for (table_name, table) in &schema.tables {
        for column in &table.columns {
            if candidate_base(&column.name).is_some()
                && resolved.get(table_name, &column.name).is_none()
            {
                warn!(
                    table = %table_name,
                    column = %column.name,
                    "candidate column left unresolved"
                );
            }
        }
    }

    info!(relationships = resolved.len(), "relationship resolution complete");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Table};

    fn schema_with(tables: &[&str]) -> Schema {
        let mut map = BTreeMap::new();
        for name in tables {
            map.insert(
                name.to_string(),
                Table {
                    name: name.to_string(),
                    columns: vec![Column {
                        name: "id".to_string(),
                        sql_type: "int".to_string(),
                        nullable: false,
                        default: None,
                        auto_increment: true,
                        comment: String::new(),
                    }],
                    primary_keys: vec!["id".to_string()],
                    row_count: 0,
                    engine: "InnoDB".to_string(),
                },
            );
        }
        Schema {
            database: "test".to_string(),
            tables: map,
            declared_foreign_keys: Vec::new(),
            indexes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_declared_never_overridden() {
        let declared = ForeignKey::declared("fk", "a", "x", "b", "id");
        let sampled = ForeignKey::sampled("a", "x", "c", "id", 0.95);
        assert_eq!(arbitrate(&declared, &sampled), Arbitration::Keep);
    }

    #[test]
    fn test_high_ratio_data_overrides_convention() {
        let convention = ForeignKey::convention("a", "x", "b", "id");
        let sampled = ForeignKey::sampled("a", "x", "c", "id", 0.95);
        assert_eq!(arbitrate(&convention, &sampled), Arbitration::Replace);
    }

    #[test]
    fn test_low_ratio_data_keeps_convention() {
        let convention = ForeignKey::convention("a", "x", "b", "id");
        let sampled = ForeignKey::sampled("a", "x", "c", "id", 0.6);
        assert_eq!(arbitrate(&convention, &sampled), Arbitration::Keep);
    }

    #[test]
    fn test_boundary_ratio_is_not_enough() {
        let convention = ForeignKey::convention("a", "x", "b", "id");
        let sampled = ForeignKey::sampled("a", "x", "c", "id", 0.8);
        assert_eq!(arbitrate(&convention, &sampled), Arbitration::Keep);
    }

    #[test]
    fn test_convention_does_not_replace_convention() {
        let first = ForeignKey::convention("a", "x", "b", "id");
        let second = ForeignKey::convention("a", "x", "c", "id");
        assert_eq!(arbitrate(&first, &second), Arbitration::Keep);
    }

    #[test]
    fn test_data_does_not_replace_data() {
        let first = ForeignKey::sampled("a", "x", "b", "id", 0.7);
        let second = ForeignKey::sampled("a", "x", "c", "id", 0.99);
        assert_eq!(arbitrate(&first, &second), Arbitration::Keep);
    }

    #[test]
    fn test_merge_single_target_per_column() {
        let schema = schema_with(&["ms", "metas", "x"]);
        let convention = vec![ForeignKey::convention("x", "m_id", "ms", "id")];
        let sampled = vec![ForeignKey::sampled("x", "m_id", "metas", "id", 1.0)];

        let resolved = merge(&schema, Vec::new(), convention, sampled);
        assert_eq!(resolved.len(), 1);
        let fk = resolved.get("x", "m_id").unwrap();
        assert_eq!(fk.to_table, "metas");
        assert_eq!(fk.origin, FkOrigin::Data);
    }

    #[test]
    fn test_merge_drops_missing_targets() {
        let schema = schema_with(&["a"]);
        let declared = vec![ForeignKey::declared("fk", "a", "x", "ghost", "id")];
        let resolved = merge(&schema, declared, Vec::new(), Vec::new());
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_convention_candidates_cover_uncovered_columns() {
        let mut schema = schema_with(&["authors", "books"]);
        schema
            .tables
            .get_mut("books")
            .unwrap()
            .columns
            .push(Column {
                name: "author_id".to_string(),
                sql_type: "int".to_string(),
                nullable: true,
                default: None,
                auto_increment: false,
                comment: String::new(),
            });

        let candidates = convention_candidates(&schema, &ResolvedRelations::new());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].from_table, "books");
        assert_eq!(candidates[0].to_table, "authors");
        assert_eq!(candidates[0].to_column, "id");
        assert_eq!(candidates[0].confidence, 0.6);
    }
}
