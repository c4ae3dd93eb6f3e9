//! Schema reader: builds a [`Schema`] snapshot from `information_schema`.
//!
//! Per-table failures are logged and the table is skipped; the run
//! proceeds with whatever subset succeeded. Row counts, engines, foreign
//! keys, and indexes are best-effort (warnings, not fatal errors).

use super::{Column, ForeignKey, Index, Schema, Table};
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Catalog read errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Query against information_schema failed
    #[error("catalog query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Nothing usable in the source database
    #[error("no readable tables in database {0}")]
    Empty(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Reads the system catalog of a MySQL database.
pub struct SchemaReader {
    pool: MySqlPool,
}

impl SchemaReader {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Build a full schema snapshot for `database`.
    pub async fn read(&self, database: &str) -> CatalogResult<Schema> {
        let names = self.table_names(database).await?;
        info!(count = names.len(), database, "discovered tables");

        let mut tables = BTreeMap::new();
        for name in &names {
            match self.read_table(database, name).await {
                Ok(table) => {
                    tables.insert(name.clone(), table);
                }
                Err(e) => {
                    warn!(table = %name, error = %e, "failed to read table schema, skipping");
                }
            }
        }

        if tables.is_empty() {
            return Err(CatalogError::Empty(database.to_string()));
        }

        let declared_foreign_keys = match self.declared_foreign_keys(database).await {
            Ok(fks) => fks,
            Err(e) => {
                warn!(error = %e, "failed to read declared foreign keys");
                Vec::new()
            }
        };

        let indexes = match self.indexes(database).await {
            Ok(indexes) => indexes,
            Err(e) => {
                warn!(error = %e, "failed to read indexes");
                BTreeMap::new()
            }
        };

        info!(
            tables = tables.len(),
            declared_fks = declared_foreign_keys.len(),
            "schema snapshot complete"
        );

        Ok(Schema {
            database: database.to_string(),
            tables,
            declared_foreign_keys,
            indexes,
        })
    }

    async fn table_names(&self, database: &str) -> CatalogResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name \
             FROM information_schema.tables \
             WHERE table_schema = ? AND table_type IN ('BASE TABLE', 'VIEW') \
             ORDER BY table_name",
        )
        .bind(database)
        .fetch_all(&self.pool)
        .await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            if is_hidden_table(&name) {
                debug!(table = %name, "skipping hidden or temporary table");
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }

    async fn read_table(&self, database: &str, name: &str) -> CatalogResult<Table> {
        let columns = self.columns(database, name).await?;

        let primary_keys = match self.primary_keys(database, name).await {
            Ok(pks) => pks,
            Err(e) => {
                warn!(table = %name, error = %e, "failed to read primary keys");
                Vec::new()
            }
        };

        let row_count = match self.row_count(name).await {
            Ok(count) => count,
            Err(e) => {
                warn!(table = %name, error = %e, "failed to count rows");
                0
            }
        };

        let engine = match self.engine(database, name).await {
            Ok(engine) => engine,
            Err(e) => {
                warn!(table = %name, error = %e, "failed to read table engine");
                String::new()
            }
        };

        Ok(Table {
            name: name.to_string(),
            columns,
            primary_keys,
            row_count,
            engine,
        })
    }

    async fn columns(&self, database: &str, table: &str) -> CatalogResult<Vec<Column>> {
        let rows = sqlx::query(
            "SELECT column_name, column_type, is_nullable, column_default, \
                    extra = 'auto_increment', COALESCE(column_comment, '') \
             FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .bind(database)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let nullable: String = row.try_get(2)?;
            let auto_increment: i64 = row.try_get(4)?;
            columns.push(Column {
                name: row.try_get(0)?,
                sql_type: row.try_get(1)?,
                nullable: nullable == "YES",
                default: row.try_get(3)?,
                auto_increment: auto_increment == 1,
                comment: row.try_get(5)?,
            });
        }
        Ok(columns)
    }

    async fn primary_keys(&self, database: &str, table: &str) -> CatalogResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT column_name \
             FROM information_schema.key_column_usage \
             WHERE table_schema = ? AND table_name = ? AND constraint_name = 'PRIMARY' \
             ORDER BY ordinal_position",
        )
        .bind(database)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>(0).map_err(CatalogError::from))
            .collect()
    }

    async fn row_count(&self, table: &str) -> CatalogResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM `{table}`");
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn engine(&self, database: &str, table: &str) -> CatalogResult<String> {
        let engine: Option<String> = sqlx::query_scalar(
            "SELECT engine \
             FROM information_schema.tables \
             WHERE table_schema = ? AND table_name = ?",
        )
        .bind(database)
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(engine.unwrap_or_default())
    }

    async fn declared_foreign_keys(&self, database: &str) -> CatalogResult<Vec<ForeignKey>> {
        let rows = sqlx::query(
            "SELECT kcu.constraint_name, kcu.table_name, kcu.column_name, \
                    kcu.referenced_table_name, kcu.referenced_column_name, \
                    rc.update_rule, rc.delete_rule \
             FROM information_schema.key_column_usage kcu \
             LEFT JOIN information_schema.referential_constraints rc \
               ON kcu.constraint_name = rc.constraint_name \
              AND kcu.table_schema = rc.constraint_schema \
             WHERE kcu.table_schema = ? AND kcu.referenced_table_name IS NOT NULL \
             ORDER BY kcu.table_name, kcu.ordinal_position",
        )
        .bind(database)
        .fetch_all(&self.pool)
        .await?;

        let mut fks = Vec::with_capacity(rows.len());
        for row in rows {
            let mut fk = ForeignKey::declared(
                row.try_get::<String, _>(0)?,
                row.try_get::<String, _>(1)?,
                row.try_get::<String, _>(2)?,
                row.try_get::<String, _>(3)?,
                row.try_get::<String, _>(4)?,
            );
            fk.update_rule = row.try_get(5)?;
            fk.delete_rule = row.try_get(6)?;
            fks.push(fk);
        }
        Ok(fks)
    }

    async fn indexes(&self, database: &str) -> CatalogResult<BTreeMap<String, Vec<Index>>> {
        let rows = sqlx::query(
            "SELECT table_name, index_name, column_name, non_unique, index_type \
             FROM information_schema.statistics \
             WHERE table_schema = ? \
             ORDER BY table_name, index_name, seq_in_index",
        )
        .bind(database)
        .fetch_all(&self.pool)
        .await?;

        // Group rows by (table, index name); column order follows
        // seq_in_index from the query ordering.
        let mut grouped: BTreeMap<String, BTreeMap<String, Index>> = BTreeMap::new();
        for row in rows {
            let table: String = row.try_get(0)?;
            let index_name: String = row.try_get(1)?;
            let column: String = row.try_get(2)?;
            let non_unique: i64 = row.try_get(3)?;
            let kind: String = row.try_get(4)?;

            grouped
                .entry(table.clone())
                .or_default()
                .entry(index_name.clone())
                .or_insert_with(|| Index {
                    name: index_name,
                    table,
                    columns: Vec::new(),
                    unique: non_unique == 0,
                    kind,
                })
                .columns
                .push(column);
        }

        Ok(grouped
            .into_iter()
            .map(|(table, indexes)| (table, indexes.into_values().collect()))
            .collect())
    }
}

/// Tables hidden from migration: dotfile-style names and temp/backup
/// suffixes left behind by tooling.
pub fn is_hidden_table(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(".tmp") || name.ends_with(".bak")
}
