//! Relationship resolution scenarios: convention discovery, data-driven
//! overrides, and the conflict arbitration rules.

use graphshift::catalog::{Column, FkOrigin, ForeignKey, Schema, Table};
use graphshift::relations::{
    arbitrate, convention_candidates, convention_target, merge, Arbitration, ResolvedRelations,
};
use std::collections::BTreeMap;

fn column(name: &str) -> Column {
    Column {
        name: name.to_string(),
        sql_type: "int".to_string(),
        nullable: true,
        default: None,
        auto_increment: false,
        comment: String::new(),
    }
}

fn table(name: &str, columns: &[&str]) -> Table {
    Table {
        name: name.to_string(),
        columns: columns.iter().map(|c| column(c)).collect(),
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

#[test]
fn test_convention_only_fk_with_common_prefix() {
    // app_posts.user_id resolves to app_users via the shared app_ prefix.
    let schema = schema_of(vec![
        table("app_users", &["id", "email"]),
        table("app_posts", &["id", "user_id", "body"]),
    ]);

    let candidates = convention_candidates(&schema, &ResolvedRelations::new());
    assert_eq!(candidates.len(), 1);
    let fk = &candidates[0];
    assert_eq!(fk.from_table, "app_posts");
    assert_eq!(fk.from_column, "user_id");
    assert_eq!(fk.to_table, "app_users");
    assert_eq!(fk.to_column, "id");
    assert_eq!(fk.origin, FkOrigin::Convention);
    assert_eq!(fk.confidence, 0.6);
}

#[test]
fn test_data_driven_override_of_convention() {
    // Convention picks ms for X.m_id; sampling finds a perfect match in
    // metas instead. The high-ratio sampled candidate wins.
    let schema = schema_of(vec![
        table("ms", &["id"]),
        table("metas", &["id"]),
        table("x", &["id", "m_id"]),
    ]);
    let convention = vec![ForeignKey::convention("x", "m_id", "ms", "id")];
    let sampled = vec![ForeignKey::sampled("x", "m_id", "metas", "id", 1.0)];

    let resolved = merge(&schema, Vec::new(), convention, sampled);
    assert_eq!(resolved.len(), 1);
    let fk = resolved.get("x", "m_id").expect("column must resolve");
    assert_eq!(fk.to_table, "metas");
    assert_eq!(fk.origin, FkOrigin::Data);
    assert_eq!(fk.confidence, 1.0);
}

#[test]
fn test_declared_beats_high_ratio_sample() {
    let schema = schema_of(vec![
        table("b", &["id"]),
        table("c", &["id"]),
        table("a", &["id", "x"]),
    ]);
    let declared = vec![ForeignKey::declared("fk_a_x", "a", "x", "b", "id")];
    let sampled = vec![ForeignKey::sampled("a", "x", "c", "id", 0.95)];

    let resolved = merge(&schema, declared, Vec::new(), sampled);
    let fk = resolved.get("a", "x").unwrap();
    assert_eq!(fk.to_table, "b");
    assert_eq!(fk.origin, FkOrigin::Declared);
}

#[test]
fn test_moderate_ratio_sample_keeps_convention() {
    let schema = schema_of(vec![
        table("b", &["id"]),
        table("c", &["id"]),
        table("a", &["id", "x"]),
    ]);
    let convention = vec![ForeignKey::convention("a", "x", "b", "id")];
    let sampled = vec![ForeignKey::sampled("a", "x", "c", "id", 0.6)];

    let resolved = merge(&schema, Vec::new(), convention, sampled);
    let fk = resolved.get("a", "x").unwrap();
    assert_eq!(fk.to_table, "b");
    assert_eq!(fk.origin, FkOrigin::Convention);
}

#[test]
fn test_arbitration_priority_matrix() {
    let declared = ForeignKey::declared("fk", "a", "x", "b", "id");
    let convention = ForeignKey::convention("a", "x", "c", "id");
    let strong = ForeignKey::sampled("a", "x", "d", "id", 0.9);
    let weak = ForeignKey::sampled("a", "x", "e", "id", 0.55);

    assert_eq!(arbitrate(&declared, &convention), Arbitration::Keep);
    assert_eq!(arbitrate(&declared, &strong), Arbitration::Keep);
    assert_eq!(arbitrate(&convention, &strong), Arbitration::Replace);
    assert_eq!(arbitrate(&convention, &weak), Arbitration::Keep);
    assert_eq!(arbitrate(&convention, &convention), Arbitration::Keep);
    assert_eq!(arbitrate(&weak, &strong), Arbitration::Keep);
}

#[test]
fn test_self_reference_resolution() {
    let schema = schema_of(vec![table("categories", &["id", "parent_id"])]);
    assert_eq!(
        convention_target(&schema, "categories", "parent_id"),
        Some("categories".to_string())
    );

    let candidates = convention_candidates(&schema, &ResolvedRelations::new());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].to_table, "categories");
}

#[test]
fn test_resolver_guarantees_one_target_per_column() {
    let schema = schema_of(vec![
        table("users", &["id"]),
        table("accounts", &["id"]),
        table("posts", &["id", "user_id"]),
    ]);
    // Two competing candidates for the same column from different
    // sources: exactly one survives.
    let convention = vec![ForeignKey::convention("posts", "user_id", "users", "id")];
    let sampled = vec![ForeignKey::sampled("posts", "user_id", "accounts", "id", 0.7)];

    let resolved = merge(&schema, Vec::new(), convention, sampled);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.get("posts", "user_id").unwrap().to_table, "users");
}

#[test]
fn test_targets_outside_snapshot_are_dropped() {
    let schema = schema_of(vec![table("posts", &["id", "user_id"])]);
    let declared = vec![ForeignKey::declared("fk", "posts", "user_id", "users", "id")];
    let resolved = merge(&schema, declared, Vec::new(), Vec::new());
    assert!(resolved.is_empty());
}
