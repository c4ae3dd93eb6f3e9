//! MySQL column type → graph primitive type mapping.
//!
//! Pure policy functions shared by the emitter (literal coercion) and the
//! schema synthesizer (predicate types, index tokenizers, upsert
//! directives). Mapping never fails: unknown SQL types fall through to
//! `string`.

/// Graph primitive types understood by Dgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphType {
    Int,
    Float,
    Bool,
    DateTime,
    String,
}

impl GraphType {
    /// Schema-document spelling of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::Int => "int",
            GraphType::Float => "float",
            GraphType::Bool => "bool",
            GraphType::DateTime => "datetime",
            GraphType::String => "string",
        }
    }
}

/// Map a raw MySQL type string (e.g. `varchar(255)`, `tinyint(1)`) to a
/// graph primitive type.
///
/// The boolean check runs before the integer-family check: `tinyint(1)`
/// is MySQL's boolean idiom and must not be swallowed by the `int`
/// substring match. `date` unifies under `datetime`.
pub fn graph_type(sql_type: &str) -> GraphType {
    let ty = sql_type.to_lowercase();

    if ty == "tinyint(1)" || ty.contains("bool") {
        return GraphType::Bool;
    }
    if ty.contains("bigint")
        || ty.contains("smallint")
        || ty.contains("mediumint")
        || ty.contains("int")
    {
        return GraphType::Int;
    }
    if ty.contains("float") || ty.contains("double") || ty.contains("decimal") {
        return GraphType::Float;
    }
    if ty == "date" || ty.contains("datetime") || ty.contains("timestamp") {
        return GraphType::DateTime;
    }
    if ty.contains("json") {
        // JSON payloads are stored as opaque strings in Dgraph.
        return GraphType::String;
    }

    GraphType::String
}

/// Column names that get an `exact` index instead of `term`.
const EXACT_HINTS: [&str; 4] = ["id", "email", "username", "slug"];

/// Column names that mark a predicate as an upsert key.
const UPSERT_HINTS: [&str; 5] = ["email", "username", "slug", "code", "uuid"];

/// Index tokenizer for a predicate of the given type.
///
/// Strings default to `term`; identifier-like names (`id`, `email`,
/// `username`, `slug`) get `exact` for equality lookups. Datetimes index
/// at hour granularity.
pub fn index_tokenizer(ty: GraphType, column_name: &str) -> &'static str {
    match ty {
        GraphType::Int => "int",
        GraphType::Float => "float",
        GraphType::Bool => "bool",
        GraphType::DateTime => "hour",
        GraphType::String => {
            let name = column_name.to_lowercase();
            if EXACT_HINTS.iter().any(|hint| name.contains(hint)) {
                "exact"
            } else {
                "term"
            }
        }
    }
}

/// Whether a column name alone suggests a unique identity (`@upsert`).
///
/// Primary-key membership is decided by the caller from the catalog; this
/// covers the naming hints.
pub fn upsert_hint(column_name: &str) -> bool {
    let name = column_name.to_lowercase();
    UPSERT_HINTS.iter().any(|hint| name.contains(hint))
}
