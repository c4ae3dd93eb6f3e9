//! Relational schema snapshot.
//!
//! Built once per run by [`SchemaReader`] and read-only afterwards. Tables
//! and indexes live in `BTreeMap`s so iteration order — and therefore
//! job submission order, schema output, and the mapping file — is
//! deterministic across runs.

mod reader;

pub use reader::{CatalogError, CatalogResult, SchemaReader};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of a MySQL database: tables, declared foreign keys, indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Source database name.
    pub database: String,
    /// Tables keyed by name.
    pub tables: BTreeMap<String, Table>,
    /// Foreign keys declared in the catalog (confidence 1.0).
    pub declared_foreign_keys: Vec<ForeignKey>,
    /// Indexes grouped by table name.
    pub indexes: BTreeMap<String, Vec<Index>>,
}

impl Schema {
    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Sum of best-effort row counts across all tables.
    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|t| t.row_count).sum()
    }

    /// Tables that fall back to a first-column surrogate key.
    pub fn surrogate_key_tables(&self) -> Vec<&str> {
        self.tables
            .values()
            .filter(|t| t.uses_surrogate_key())
            .map(|t| t.name.as_str())
            .collect()
    }
}

/// A table with its columns in ordinal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Columns ordered by ordinal position.
    pub columns: Vec<Column>,
    /// Primary-key column names ordered by ordinal position.
    pub primary_keys: Vec<String>,
    /// Best-effort row count (0 when estimation failed).
    pub row_count: u64,
    /// Storage engine (`InnoDB`, …).
    pub engine: String,
}

impl Table {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The column that identifies a row: the first primary-key column,
    /// else the first column named `id` or ending in `_id`, else the
    /// first column as a surrogate.
    pub fn key_column(&self) -> Option<&str> {
        if let Some(pk) = self.primary_keys.first() {
            return Some(pk.as_str());
        }
        if let Some(col) = self.columns.iter().find(|c| {
            let name = c.name.to_lowercase();
            name == "id" || name.ends_with("_id")
        }) {
            return Some(col.name.as_str());
        }
        self.columns.first().map(|c| c.name.as_str())
    }

    /// True when neither a primary key nor an `id`-like column exists and
    /// the first column stands in as the row key.
    pub fn uses_surrogate_key(&self) -> bool {
        if !self.primary_keys.is_empty() {
            return false;
        }
        let has_id_column = self.columns.iter().any(|c| {
            let name = c.name.to_lowercase();
            name == "id" || name.ends_with("_id")
        });
        !has_id_column && !self.columns.is_empty()
    }
}

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Raw MySQL type string, e.g. `varchar(255)` or `tinyint(1)`.
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub auto_increment: bool,
    pub comment: String,
}

/// How a foreign key was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FkOrigin {
    /// Declared in the catalog.
    Declared,
    /// Inferred from column naming conventions.
    Convention,
    /// Confirmed by sampling column values against target keys.
    Data,
}

/// A foreign-key relationship, declared or discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub constraint_name: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub origin: FkOrigin,
    /// 1.0 for declared keys, 0.6 for convention keys, the observed
    /// match ratio for data-sampled keys.
    pub confidence: f64,
    /// ON UPDATE rule for declared keys.
    pub update_rule: Option<String>,
    /// ON DELETE rule for declared keys.
    pub delete_rule: Option<String>,
}

impl ForeignKey {
    /// A declared key read from the catalog.
    pub fn declared(
        constraint_name: impl Into<String>,
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
            origin: FkOrigin::Declared,
            confidence: 1.0,
            update_rule: None,
            delete_rule: None,
        }
    }

    /// A convention-inferred key (fixed 0.6 confidence).
    pub fn convention(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        let from_table = from_table.into();
        let from_column = from_column.into();
        Self {
            constraint_name: format!("fk_{from_table}_{from_column}"),
            from_table,
            from_column,
            to_table: to_table.into(),
            to_column: to_column.into(),
            origin: FkOrigin::Convention,
            confidence: 0.6,
            update_rule: None,
            delete_rule: None,
        }
    }

    /// A data-sampled key carrying the observed match ratio.
    pub fn sampled(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
        ratio: f64,
    ) -> Self {
        let from_table = from_table.into();
        let from_column = from_column.into();
        Self {
            constraint_name: format!("fk_{from_table}_{from_column}"),
            from_table,
            from_column,
            to_table: to_table.into(),
            to_column: to_column.into(),
            origin: FkOrigin::Data,
            confidence: ratio,
            update_rule: None,
            delete_rule: None,
        }
    }
}

/// A database index grouped from `information_schema.statistics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Index kind as reported by MySQL (`BTREE`, `FULLTEXT`, …).
    pub kind: String,
}
