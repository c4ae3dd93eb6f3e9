//! End-to-end emission scenarios: rows in, N-Quad lines out through the
//! chunked sink, with reverse pairing and stable identifiers.

use graphshift::catalog::{Column, ForeignKey, Schema, Table};
use graphshift::emit::{ChunkedSink, RowEmitter, SinkOptions, UidAllocator};
use graphshift::relations::{merge, ResolvedRelations};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

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

fn table(name: &str, columns: Vec<Column>) -> Table {
    Table {
        name: name.to_string(),
        columns,
        primary_keys: vec!["id".to_string()],
        row_count: 0,
        engine: "InnoDB".to_string(),
    }
}

fn schema_of(tables: Vec<Table>) -> Schema {
    Schema {
        database: "test".to_string(),
        tables: tables
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect::<BTreeMap<_, _>>(),
        declared_foreign_keys: Vec::new(),
        indexes: BTreeMap::new(),
    }
}

fn emitter_in(dir: &Path, relations: ResolvedRelations) -> (RowEmitter, Arc<ChunkedSink>) {
    let sink = Arc::new(
        ChunkedSink::create(SinkOptions {
            directory: dir.to_path_buf(),
            rdf_file: "data.rdf".to_string(),
            chunk_threshold: 50_000,
            dry_run: false,
        })
        .unwrap(),
    );
    let emitter = RowEmitter::new(
        Arc::new(relations),
        Arc::new(UidAllocator::new()),
        Arc::clone(&sink),
    );
    (emitter, sink)
}

fn cell(value: &str) -> Option<Vec<u8>> {
    Some(value.as_bytes().to_vec())
}

fn books_fixture() -> (Schema, ResolvedRelations) {
    let authors = table("authors", vec![column("id", "int"), column("name", "varchar(100)")]);
    let books = table(
        "books",
        vec![
            column("id", "int"),
            column("title", "varchar(100)"),
            column("author_id", "int"),
        ],
    );
    let schema = schema_of(vec![authors, books]);
    let relations = merge(
        &schema,
        vec![ForeignKey::declared(
            "fk_books_author",
            "books",
            "author_id",
            "authors",
            "id",
        )],
        Vec::new(),
        Vec::new(),
    );
    (schema, relations)
}

#[test]
fn test_declared_fk_scenario_output() {
    let (schema, relations) = books_fixture();
    let dir = tempfile::tempdir().unwrap();
    let (emitter, sink) = emitter_in(dir.path(), relations);

    let authors = schema.table("authors").unwrap();
    let books = schema.table("books").unwrap();

    emitter.emit_row(authors, &[cell("1"), cell("Ada")]).unwrap();
    emitter
        .emit_row(books, &[cell("10"), cell("T"), cell("1")])
        .unwrap();
    sink.finalize().unwrap();

    let content = std::fs::read_to_string(dir.path().join("data_chunk_1.rdf")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "_:authors_1 <dgraph.type> \"authors\" .",
            "_:authors_1 <authors.id> \"1\" .",
            "_:authors_1 <authors.name> \"Ada\" .",
            "_:books_10 <dgraph.type> \"books\" .",
            "_:books_10 <books.id> \"10\" .",
            "_:books_10 <books.title> \"T\" .",
            "_:books_10 <books.author_id> _:authors_1 .",
            "_:authors_1 <books.author_id_reverse> _:books_10 .",
            "_:authors_1 <authors.bookses> _:books_10 .",
        ]
    );
}

#[test]
fn test_reverse_pairing_for_every_forward_edge() {
    let (schema, relations) = books_fixture();
    let dir = tempfile::tempdir().unwrap();
    let (emitter, sink) = emitter_in(dir.path(), relations);

    let authors = schema.table("authors").unwrap();
    let books = schema.table("books").unwrap();
    emitter.emit_row(authors, &[cell("1"), cell("Ada")]).unwrap();
    for (id, author) in [("10", "1"), ("11", "1"), ("12", "1")] {
        emitter
            .emit_row(books, &[cell(id), cell("t"), cell(author)])
            .unwrap();
    }
    sink.finalize().unwrap();

    let content = std::fs::read_to_string(dir.path().join("data_chunk_1.rdf")).unwrap();
    let forward: Vec<&str> = content
        .lines()
        .filter(|l| l.contains("<books.author_id>"))
        .collect();
    let reverse: Vec<&str> = content
        .lines()
        .filter(|l| l.contains("<books.author_id_reverse>"))
        .collect();
    let semantic: Vec<&str> = content
        .lines()
        .filter(|l| l.contains("<authors.bookses>"))
        .collect();

    assert_eq!(forward.len(), 3);
    assert_eq!(reverse.len(), 3);
    assert_eq!(semantic.len(), 3);

    // Exactly one reverse and one collection edge per forward edge.
    for id in ["10", "11", "12"] {
        assert_eq!(
            content
                .lines()
                .filter(|l| *l == format!("_:authors_1 <books.author_id_reverse> _:books_{id} ."))
                .count(),
            1
        );
        assert_eq!(
            content
                .lines()
                .filter(|l| *l == format!("_:authors_1 <authors.bookses> _:books_{id} ."))
                .count(),
            1
        );
    }
}

#[test]
fn test_no_orphan_edge_targets_when_rows_materialize() {
    // Every node that appears as an edge object also gets a dgraph.type
    // line once its own row is emitted, regardless of emission order.
    let (schema, relations) = books_fixture();
    let dir = tempfile::tempdir().unwrap();
    let (emitter, sink) = emitter_in(dir.path(), relations);

    let authors = schema.table("authors").unwrap();
    let books = schema.table("books").unwrap();
    // Book first: the author node label is minted before its row.
    emitter
        .emit_row(books, &[cell("10"), cell("T"), cell("1")])
        .unwrap();
    emitter.emit_row(authors, &[cell("1"), cell("Ada")]).unwrap();
    sink.finalize().unwrap();

    let content = std::fs::read_to_string(dir.path().join("data_chunk_1.rdf")).unwrap();
    let mut object_labels: Vec<&str> = content
        .lines()
        .filter_map(|l| l.split_whitespace().nth(2))
        .filter(|w| w.starts_with("_:"))
        .collect();
    object_labels.sort();
    object_labels.dedup();

    for label in object_labels {
        assert!(
            content
                .lines()
                .any(|l| l.starts_with(&format!("{label} <dgraph.type>"))),
            "edge target {label} has no type declaration"
        );
    }
}

#[test]
fn test_identifier_stability_across_runs() {
    // The same schema and row order yield byte-identical mapping files.
    let (schema, relations) = books_fixture();

    let mut mappings = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let (emitter, sink) = emitter_in(dir.path(), relations.clone());
        let authors = schema.table("authors").unwrap();
        let books = schema.table("books").unwrap();

        emitter.emit_row(authors, &[cell("1"), cell("Ada")]).unwrap();
        emitter
            .emit_row(books, &[cell("10"), cell("T"), cell("1")])
            .unwrap();
        sink.finalize().unwrap();

        let uids = UidAllocator::new();
        uids.get_or_create("authors", "1");
        uids.get_or_create("books", "10");
        let path = dir.path().join("uid_mapping.txt");
        uids.persist(&path, &[]).unwrap();
        mappings.push(std::fs::read_to_string(&path).unwrap());
    }
    assert_eq!(mappings[0], mappings[1]);
    assert_eq!(mappings[0], "authors:1=_:authors_1\nbooks:10=_:books_10\n");
}

#[test]
fn test_escape_scenario() {
    let notes = table("notes", vec![column("id", "int"), column("body", "text")]);
    let schema = schema_of(vec![notes]);
    let relations = merge(&schema, Vec::new(), Vec::new(), Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let (emitter, sink) = emitter_in(dir.path(), relations);

    emitter
        .emit_row(
            schema.table("notes").unwrap(),
            &[cell("1"), cell("a\"b\nc")],
        )
        .unwrap();
    sink.finalize().unwrap();

    let content = std::fs::read_to_string(dir.path().join("data_chunk_1.rdf")).unwrap();
    // The literal contains an escaped quote and a two-character \n
    // sequence — not a real line break.
    assert!(content.contains("_:notes_1 <notes.body> \"a\\\"b\\nc\" ."));
    assert_eq!(content.lines().count(), 3);
}
