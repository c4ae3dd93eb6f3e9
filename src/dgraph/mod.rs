//! Dgraph schema synthesis.
//!
//! Produces a single schema document: a sorted predicate section (typed,
//! indexed, `@reverse`/`@upsert` directives) followed by one `type` block
//! per table listing its own predicates, its outgoing edge predicates,
//! and the reverse predicates contributed by incoming edges.

use crate::catalog::{Schema, Table};
use crate::rdf::pluralize;
use crate::relations::ResolvedRelations;
use crate::typemap::{graph_type, index_tokenizer, upsert_hint};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// One predicate declaration.
#[derive(Debug, Clone)]
pub struct PredicateInfo {
    pub name: String,
    pub value_type: String,
    pub index: Option<String>,
    pub list: bool,
    pub reverse: bool,
    pub upsert: bool,
}

impl PredicateInfo {
    fn schema_line(&self) -> String {
        let mut line = String::new();
        line.push_str(&self.name);
        line.push_str(": ");
        if self.list {
            line.push('[');
            line.push_str(&self.value_type);
            line.push(']');
        } else {
            line.push_str(&self.value_type);
        }
        if let Some(tokenizer) = &self.index {
            line.push_str(&format!(" @index({tokenizer})"));
        }
        if self.reverse {
            line.push_str(" @reverse");
        }
        if self.upsert {
            line.push_str(" @upsert");
        }
        line.push_str(" .");
        line
    }
}

/// Synthesize the full schema document for a snapshot and its resolved
/// relationships.
pub fn synthesize(schema: &Schema, relations: &ResolvedRelations) -> String {
    let predicates = build_predicates(schema, relations);
    let types = build_types(schema, relations);

    let mut out = String::new();
    write_header(&mut out);

    out.push_str("# PREDICATES\n\n");
    for predicate in predicates.values() {
        out.push_str(&predicate.schema_line());
        out.push('\n');
    }
    out.push('\n');

    out.push_str("# TYPES\n\n");
    for (table, members) in &types {
        out.push_str(&format!("type {table} {{\n"));
        out.push_str("  dgraph.type\n");
        for member in members {
            out.push_str(&format!("  {member}\n"));
        }
        out.push_str("}\n\n");
    }

    info!(
        predicates = predicates.len(),
        types = types.len(),
        "Dgraph schema synthesized"
    );
    out
}

fn write_header(out: &mut String) {
    out.push_str("# Dgraph schema generated from MySQL\n");
    out.push_str("# Do not edit this file manually.\n");
    out.push_str("#\n");
    out.push_str("# Includes all table columns as predicates, foreign-key\n");
    out.push_str("# relationships with @reverse, and type definitions per table.\n\n");
}

fn build_predicates(
    schema: &Schema,
    relations: &ResolvedRelations,
) -> BTreeMap<String, PredicateInfo> {
    let mut predicates = BTreeMap::new();

    for (table_name, table) in &schema.tables {
        for column in &table.columns {
            let name = format!("{table_name}.{}", column.name);
            let ty = graph_type(&column.sql_type);
            predicates.insert(
                name.clone(),
                PredicateInfo {
                    name,
                    value_type: ty.as_str().to_string(),
                    index: Some(index_tokenizer(ty, &column.name).to_string()),
                    list: false,
                    reverse: false,
                    upsert: is_upsert(table, &column.name),
                },
            );
        }
    }

    for fk in relations.iter() {
        // Forward edge: the column predicate becomes a uid reference;
        // uid predicates carry no index tokenizer.
        let forward = format!("{}.{}", fk.from_table, fk.from_column);
        predicates.insert(
            forward.clone(),
            PredicateInfo {
                name: forward.clone(),
                value_type: "uid".to_string(),
                index: None,
                list: false,
                reverse: true,
                upsert: false,
            },
        );

        let reverse = format!("{forward}_reverse");
        predicates.insert(
            reverse.clone(),
            PredicateInfo {
                name: reverse,
                value_type: "uid".to_string(),
                index: None,
                list: true,
                reverse: true,
                upsert: false,
            },
        );

        let collection = format!("{}.{}", fk.to_table, pluralize(&fk.from_table));
        predicates.entry(collection.clone()).or_insert(PredicateInfo {
            name: collection,
            value_type: "uid".to_string(),
            index: None,
            list: true,
            reverse: true,
            upsert: false,
        });
    }

    predicates
}

fn build_types(schema: &Schema, relations: &ResolvedRelations) -> BTreeMap<String, Vec<String>> {
    let mut types = BTreeMap::new();

    for (table_name, table) in &schema.tables {
        let mut members = BTreeSet::new();

        for column in &table.columns {
            members.insert(format!("{table_name}.{}", column.name));
        }

        for fk in relations.iter() {
            if &fk.from_table == table_name {
                members.insert(format!("{}.{}", fk.from_table, fk.from_column));
            }
            if &fk.to_table == table_name {
                members.insert(format!("{}.{}_reverse", fk.from_table, fk.from_column));
                members.insert(format!("{table_name}.{}", pluralize(&fk.from_table)));
            }
        }

        types.insert(table_name.clone(), members.into_iter().collect());
    }

    types
}

fn is_upsert(table: &Table, column: &str) -> bool {
    table.primary_keys.iter().any(|pk| pk == column) || upsert_hint(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, ForeignKey};
    use crate::relations::merge;

    fn column(name: &str, sql_type: &str) -> Column {
        Column {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: true,
            default: None,
            auto_increment: false,
            comment: String::new(),
        }
    }

    fn books_schema() -> Schema {
        let mut tables = BTreeMap::new();
        tables.insert(
            "authors".to_string(),
            Table {
                name: "authors".to_string(),
                columns: vec![column("id", "int"), column("name", "varchar(100)")],
                primary_keys: vec!["id".to_string()],
                row_count: 0,
                engine: "InnoDB".to_string(),
            },
        );
        tables.insert(
            "books".to_string(),
            Table {
                name: "books".to_string(),
                columns: vec![
                    column("id", "int"),
                    column("title", "varchar(100)"),
                    column("author_id", "int"),
                ],
                primary_keys: vec!["id".to_string()],
                row_count: 0,
                engine: "InnoDB".to_string(),
            },
        );
        Schema {
            database: "test".to_string(),
            tables,
            declared_foreign_keys: Vec::new(),
            indexes: BTreeMap::new(),
        }
    }

    fn books_relations(schema: &Schema) -> ResolvedRelations {
        merge(
            schema,
            vec![ForeignKey::declared(
                "fk_books_author",
                "books",
                "author_id",
                "authors",
                "id",
            )],
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_predicate_lines() {
        let schema = books_schema();
        let relations = books_relations(&schema);
        let document = synthesize(&schema, &relations);

        assert!(document.contains("authors.id: int @index(int) @upsert .\n"));
        assert!(document.contains("authors.name: string @index(term) .\n"));
        assert!(document.contains("books.title: string @index(term) .\n"));
        assert!(document.contains("books.author_id: uid @reverse .\n"));
        assert!(document.contains("books.author_id_reverse: [uid] @reverse .\n"));
        assert!(document.contains("authors.bookses: [uid] @reverse .\n"));
    }

    #[test]
    fn test_type_blocks() {
        let schema = books_schema();
        let relations = books_relations(&schema);
        let document = synthesize(&schema, &relations);

        let authors_block = document
            .split("type authors {")
            .nth(1)
            .and_then(|rest| rest.split('}').next())
            .unwrap();
        assert!(authors_block.contains("dgraph.type"));
        assert!(authors_block.contains("authors.id"));
        assert!(authors_block.contains("authors.name"));
        assert!(authors_block.contains("books.author_id_reverse"));
        assert!(authors_block.contains("authors.bookses"));

        let books_block = document
            .split("type books {")
            .nth(1)
            .and_then(|rest| rest.split('}').next())
            .unwrap();
        assert!(books_block.contains("books.author_id"));
        assert!(books_block.contains("books.title"));
        assert!(!books_block.contains("authors.name"));
    }

    #[test]
    fn test_every_column_predicate_listed_in_owning_type() {
        let schema = books_schema();
        let relations = books_relations(&schema);
        let predicates = build_predicates(&schema, &relations);
        let types = build_types(&schema, &relations);

        for (table_name, table) in &schema.tables {
            for column in &table.columns {
                let predicate = format!("{table_name}.{}", column.name);
                assert!(predicates.contains_key(&predicate));
                assert!(
                    types[table_name].contains(&predicate),
                    "{predicate} missing from type {table_name}"
                );
            }
        }
    }

    #[test]
    fn test_predicates_sorted_and_unique() {
        let schema = books_schema();
        let relations = books_relations(&schema);
        let document = synthesize(&schema, &relations);

        let predicate_section = document
            .split("# PREDICATES")
            .nth(1)
            .and_then(|rest| rest.split("# TYPES").next())
            .unwrap();
        let lines: Vec<&str> = predicate_section
            .lines()
            .filter(|l| !l.is_empty())
            .collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn test_self_reference_types() {
        let mut tables = BTreeMap::new();
        tables.insert(
            "categories".to_string(),
            Table {
                name: "categories".to_string(),
                columns: vec![column("id", "int"), column("parent_id", "int")],
                primary_keys: vec!["id".to_string()],
                row_count: 0,
                engine: "InnoDB".to_string(),
            },
        );
        let schema = Schema {
            database: "test".to_string(),
            tables,
            declared_foreign_keys: Vec::new(),
            indexes: BTreeMap::new(),
        };
        let relations = merge(
            &schema,
            Vec::new(),
            vec![ForeignKey::convention(
                "categories",
                "parent_id",
                "categories",
                "id",
            )],
            Vec::new(),
        );

        let document = synthesize(&schema, &relations);
        assert!(document.contains("categories.parent_id: uid @reverse .\n"));
        assert!(document.contains("categories.parent_id_reverse: [uid] @reverse .\n"));
        assert!(document.contains("categories.categorieses: [uid] @reverse .\n"));
    }
}
