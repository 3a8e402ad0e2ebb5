//! Schema synchronization.
//!
//! Brings the table behind each entity in line with its descriptor. A missing
//! table is created with every field; an existing table only gains the columns
//! it lacks. Columns are never altered or dropped.

use crate::db::executor::DbConnection;
use crate::db::pool::ConnectionPool;
use crate::db::types::column_type;
use crate::error::{DbError, DbResult};
use crate::models::{Backend, EntityDescriptor, FieldDescriptor, IdStrategy};
use std::sync::Arc;
use tracing::{debug, info};

/// What [`SchemaSynchronizer::synchronize`] did to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Patched { added_columns: Vec<String> },
    UpToDate,
}

/// `CREATE TABLE IF NOT EXISTS` statement for an entity.
pub fn create_table_sql(backend: Backend, entity: &EntityDescriptor) -> String {
    let columns: Vec<String> = entity
        .fields
        .iter()
        .map(|field| column_definition(backend, field))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        entity.table,
        columns.join(", ")
    )
}

/// `ALTER TABLE ... ADD COLUMN` statement for one missing field.
pub fn add_column_sql(table: &str, field: &FieldDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table,
        field.name,
        column_type(field)
    )
}

fn column_definition(backend: Backend, field: &FieldDescriptor) -> String {
    let Some(strategy) = field.id else {
        return format!("{} {}", field.name, column_type(field));
    };

    match (backend, strategy) {
        (Backend::MySql, _) => format!(
            "{} {} {} PRIMARY KEY",
            field.name,
            column_type(field),
            strategy.mysql_keyword()
        ),
        // SQLite only auto-increments a column declared exactly INTEGER PRIMARY KEY.
        (Backend::SQLite, IdStrategy::AutoIncrement) => {
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", field.name)
        }
        (Backend::SQLite, IdStrategy::GeneratedUuid) => format!(
            "{} {} DEFAULT (lower(hex(randomblob(16)))) PRIMARY KEY",
            field.name,
            column_type(field)
        ),
    }
}

/// Creates and patches entity tables through a connection pool.
#[derive(Debug, Clone)]
pub struct SchemaSynchronizer {
    pool: Arc<ConnectionPool>,
}

impl SchemaSynchronizer {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Create or patch the table for one entity.
    ///
    /// Every failure is reported as a schema error naming the table.
    pub async fn synchronize(&self, entity: &EntityDescriptor) -> DbResult<SyncOutcome> {
        let table = entity.table.as_str();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DbError::schema(e.to_string(), table))?;

        let result = Self::apply(&mut conn, self.pool.backend(), entity).await;
        self.pool.release(conn);

        match result {
            Ok(outcome) => {
                match &outcome {
                    SyncOutcome::Created => info!(table = %table, "Table created"),
                    SyncOutcome::Patched { added_columns } => {
                        info!(table = %table, columns = ?added_columns, "Table patched")
                    }
                    SyncOutcome::UpToDate => debug!(table = %table, "Table up to date"),
                }
                Ok(outcome)
            }
            Err(e) => Err(DbError::schema(e.to_string(), table)),
        }
    }

    async fn apply(
        conn: &mut DbConnection,
        backend: Backend,
        entity: &EntityDescriptor,
    ) -> DbResult<SyncOutcome> {
        if !conn.table_exists(&entity.table).await? {
            let sql = create_table_sql(backend, entity);
            debug!(sql = %sql, "Creating table");
            conn.execute(&sql, &[]).await?;
            return Ok(SyncOutcome::Created);
        }

        let mut added_columns = Vec::new();
        for field in &entity.fields {
            if conn.column_exists(&entity.table, &field.name).await? {
                continue;
            }
            let sql = add_column_sql(&entity.table, field);
            debug!(sql = %sql, "Adding column");
            conn.execute(&sql, &[]).await?;
            added_columns.push(field.name.clone());
        }

        if added_columns.is_empty() {
            Ok(SyncOutcome::UpToDate)
        } else {
            Ok(SyncOutcome::Patched { added_columns })
        }
    }
}
