//! Naming-convention foreign-key candidates.
//!
//! A column like `author_id` probably references a table named `author`,
//! `authors`, or — in schemas that prefix every table — `app_authors`.
//! This module derives the candidate target list and picks the first one
//! that actually exists in the snapshot. Pure functions; the data-driven
//! confirmation lives in [`super::sampling`].

use crate::catalog::Schema;
use std::collections::{BTreeMap, BTreeSet};

const FK_SUFFIXES: [&str; 3] = ["_id", "_key", "_ref"];
const FK_PREFIXES: [&str; 2] = ["id_", "fk_"];

/// Strip a foreign-key affix from a column name, yielding the base name.
///
/// Returns `None` when the column does not look like a reference at all
/// (no affix, or the bare name `id`).
pub fn candidate_base(column: &str) -> Option<String> {
    let name = column.to_lowercase();
    if name == "id" {
        return None;
    }
    for suffix in FK_SUFFIXES {
        if let Some(base) = name.strip_suffix(suffix) {
            if !base.is_empty() {
                return Some(base.to_string());
            }
        }
    }
    for prefix in FK_PREFIXES {
        if let Some(base) = name.strip_prefix(prefix) {
            if !base.is_empty() {
                return Some(base.to_string());
            }
        }
    }
    None
}

/// Singular/plural table-name forms for a base name, in search order.
pub fn name_forms(base: &str) -> Vec<String> {
    vec![
        base.to_string(),
        format!("{base}s"),
        format!("{base}es"),
        format!("{base}ies"),
    ]
}

/// Common table prefixes: a `<prefix>_` segment shared by at least two
/// table names (`app_users`, `app_posts` → `app_`).
pub fn detect_common_prefixes<'a>(tables: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for table in tables {
        if let Some(idx) = table.find('_') {
            if idx > 0 {
                let prefix = format!("{}_", &table[..idx]);
                *counts.entry(prefix).or_default() += 1;
            }
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .map(|(prefix, _)| prefix)
        .collect()
}

/// Resolve the convention target table for `column` of `table`, if any.
///
/// Search order: plain name forms of the base; self-reference for
/// `parent`/`original` bases and `<table>_id` columns; each detected
/// common prefix prepended to the name forms; for compound bases, the
/// last component's forms with and without prefixes. The first existing
/// table wins.
pub fn convention_target(schema: &Schema, table: &str, column: &str) -> Option<String> {
    let base = candidate_base(column)?;
    let prefixes = detect_common_prefixes(schema.tables.keys().map(|s| s.as_str()));

    let mut candidates: Vec<String> = name_forms(&base);

    if base == "parent" || base == "original" || column.to_lowercase() == format!("{table}_id") {
        candidates.push(table.to_string());
    }

    for prefix in &prefixes {
        for form in name_forms(&base) {
            candidates.push(format!("{prefix}{form}"));
        }
    }

    if let Some(last) = base.rsplit('_').next() {
        if last != base {
            candidates.extend(name_forms(last));
            for prefix in &prefixes {
                for form in name_forms(last) {
                    candidates.push(format!("{prefix}{form}"));
                }
            }
        }
    }

    candidates
        .into_iter()
        .find(|candidate| schema.tables.contains_key(candidate))
}
