//! Row-to-RDF emission.
//!
//! Each row becomes a contiguous block of triples: a `dgraph.type`
//! declaration, one literal triple per populated column, and for every
//! resolved foreign-key column a forward edge plus a `_reverse` edge and
//! a semantic collection edge on the target. Blocks go through the
//! serial sink so lines from concurrent workers never interleave.

mod sink;
mod uid;

pub use sink::{
    chunk_file_name, manifest_file_name, ChunkRecord, ChunkedSink, SinkError, SinkOptions,
    SinkResult,
};
pub use uid::{UidAllocator, UidError, UidResult};

use crate::catalog::{Column, Table};
use crate::rdf::{pluralize, Triple};
use crate::relations::ResolvedRelations;
use crate::typemap::{graph_type, GraphType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Emission errors
#[derive(Error, Debug)]
pub enum EmitError {
    /// Sink write failed — fatal
    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type EmitResult<T> = Result<T, EmitError>;

/// What happened to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Row emitted with this many triples.
    Emitted(u64),
    /// Row skipped: no usable primary value.
    Skipped,
}

/// Converts rows to triples and writes them through the shared sink.
pub struct RowEmitter {
    relations: Arc<ResolvedRelations>,
    uids: Arc<UidAllocator>,
    sink: Arc<ChunkedSink>,
}

impl RowEmitter {
    pub fn new(
        relations: Arc<ResolvedRelations>,
        uids: Arc<UidAllocator>,
        sink: Arc<ChunkedSink>,
    ) -> Self {
        Self {
            relations,
            uids,
            sink,
        }
    }

    /// Emit one row. `values` is ordered like `table.columns` (the batch
    /// reader projects columns in catalog order).
    pub fn emit_row(&self, table: &Table, values: &[Option<Vec<u8>>]) -> EmitResult<RowOutcome> {
        match self.row_triples(table, values) {
            Some(triples) => {
                let count = triples.len() as u64;
                self.sink.write_block(&triples)?;
                Ok(RowOutcome::Emitted(count))
            }
            None => Ok(RowOutcome::Skipped),
        }
    }

    /// Build the triple block for a row without writing it. Returns
    /// `None` when the row has no usable primary value.
    pub fn row_triples(&self, table: &Table, values: &[Option<Vec<u8>>]) -> Option<Vec<Triple>> {
        let Some(primary) = primary_value(table, values) else {
            warn!(table = %table.name, "skipping row without a usable primary value");
            return None;
        };

        let subject = self.uids.get_or_create(&table.name, &primary);
        let mut triples = vec![Triple::type_declaration(subject.as_str(), table.name.as_str())];

        for (column, cell) in table.columns.iter().zip(values) {
            let Some(value) = populated(cell) else {
                continue;
            };
            let predicate = format!("{}.{}", table.name, column.name);

            if let Some(fk) = self.relations.get(&table.name, &column.name) {
                let object = self.uids.get_or_create(&fk.to_table, &value);
                triples.push(Triple::node(
                    subject.as_str(),
                    predicate.as_str(),
                    object.as_str(),
                ));
                triples.push(Triple::node(
                    object.as_str(),
                    format!("{predicate}_reverse"),
                    subject.as_str(),
                ));
                triples.push(Triple::node(
                    object.as_str(),
                    format!("{}.{}", fk.to_table, pluralize(&table.name)),
                    subject.as_str(),
                ));
            } else {
                triples.push(Triple::literal(
                    subject.as_str(),
                    predicate.as_str(),
                    coerce_literal(table, column, &value),
                ));
            }
        }

        Some(triples)
    }
}

/// The value identifying this row, per the key-column rules: first
/// primary-key column, else `id`/`*_id` column, else first column.
/// Empty values and the literal string `null` disqualify the row.
fn primary_value(table: &Table, values: &[Option<Vec<u8>>]) -> Option<String> {
    let key = table.key_column()?;
    let index = table.columns.iter().position(|c| c.name == key)?;
    populated(values.get(index)?)
}

/// Decode a cell, treating SQL NULL, empty strings, and the literal
/// string `null` as absent.
fn populated(cell: &Option<Vec<u8>>) -> Option<String> {
    let bytes = cell.as_ref()?;
    let value = String::from_utf8_lossy(bytes);
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(value.into_owned())
}

/// Coerce a literal toward its mapped graph type. Coercion failures are
/// logged at warn and the raw string is written as-is.
fn coerce_literal(table: &Table, column: &Column, raw: &str) -> String {
    match graph_type(&column.sql_type) {
        GraphType::Int => {
            let trimmed = raw.trim();
            if trimmed.parse::<i64>().is_ok() {
                trimmed.to_string()
            } else {
                coercion_warning(table, column, raw, "int");
                raw.to_string()
            }
        }
        GraphType::Float => {
            let trimmed = raw.trim();
            if trimmed.parse::<f64>().is_ok() {
                trimmed.to_string()
            } else {
                coercion_warning(table, column, raw, "float");
                raw.to_string()
            }
        }
        GraphType::Bool => match raw.trim() {
            "1" => "true".to_string(),
            "0" => "false".to_string(),
            other if other.eq_ignore_ascii_case("true") => "true".to_string(),
            other if other.eq_ignore_ascii_case("false") => "false".to_string(),
            _ => {
                coercion_warning(table, column, raw, "bool");
                raw.to_string()
            }
        },
        GraphType::DateTime => match coerce_datetime(raw.trim()) {
            Some(formatted) => formatted,
            None => {
                coercion_warning(table, column, raw, "datetime");
                raw.to_string()
            }
        },
        GraphType::String => raw.to_string(),
    }
}

fn coercion_warning(table: &Table, column: &Column, raw: &str, target: &str) {
    warn!(
        table = %table.name,
        column = %column.name,
        value = %raw,
        target,
        "value does not coerce, writing raw string"
    );
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

/// Normalize common MySQL datetime spellings to RFC 3339 (UTC assumed
/// for zone-less values).
fn coerce_datetime(value: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(midnight.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    None
}
