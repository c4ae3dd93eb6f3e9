//! RDF triple model for the migration output.
//!
//! Subjects are always blank-node labels (`_:authors_1`), predicates are
//! `<table>.<column>` strings, and objects are either blank-node labels
//! (foreign-key edges) or double-quoted literals. `Display` produces one
//! N-Quad-style line per triple, terminated with ` .` and no trailing
//! newline.

mod escape;
mod pluralize;

pub use escape::escape_literal;
pub use pluralize::pluralize;

use std::fmt;

/// Predicate used for node type declarations.
pub const TYPE_PREDICATE: &str = "dgraph.type";

/// The object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// A reference to another node, stored as a full blank-node label.
    Node(String),
    /// A literal value, stored raw; escaping happens at format time.
    Literal(String),
}

impl Object {
    /// Check if this is a node reference
    pub fn is_node(&self) -> bool {
        matches!(self, Object::Node(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Object::Literal(_))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Node(label) => write!(f, "{label}"),
            Object::Literal(value) => write!(f, "\"{}\"", escape_literal(value)),
        }
    }
}

/// A single output triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    /// Subject blank-node label, including the `_:` prefix.
    pub subject: String,
    /// Predicate name, written inside angle brackets.
    pub predicate: String,
    /// Object: node reference or literal.
    pub object: Object,
}

impl Triple {
    /// Create a triple whose object is a node reference.
    pub fn node(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object_label: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: Object::Node(object_label.into()),
        }
    }

    /// Create a triple whose object is a literal value.
    pub fn literal(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: Object::Literal(value.into()),
        }
    }

    /// The `<subject> <dgraph.type> "<table>"` declaration for a node.
    pub fn type_declaration(subject: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: TYPE_PREDICATE.to_string(),
            object: Object::Literal(table.into()),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_triple_line() {
        let t = Triple::literal("_:authors_1", "authors.name", "Ada");
        assert_eq!(t.to_string(), "_:authors_1 <authors.name> \"Ada\" .");
    }

    #[test]
    fn test_node_triple_line() {
        let t = Triple::node("_:books_10", "books.author_id", "_:authors_1");
        assert_eq!(t.to_string(), "_:books_10 <books.author_id> _:authors_1 .");
        assert!(t.object.is_node());
    }

    #[test]
    fn test_type_declaration() {
        let t = Triple::type_declaration("_:authors_1", "authors");
        assert_eq!(t.to_string(), "_:authors_1 <dgraph.type> \"authors\" .");
        assert!(t.object.is_literal());
    }

    #[test]
    fn test_literal_escaped_at_format_time() {
        let t = Triple::literal("_:t_1", "t.v", "a\"b\nc");
        assert_eq!(t.to_string(), "_:t_1 <t.v> \"a\\\"b\\nc\" .");
    }
}
