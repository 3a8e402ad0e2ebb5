//! Shared fixtures for integration tests.

#![allow(dead_code)]

use aero_orm::config::Config;
use aero_orm::db::ConnectionPool;
use aero_orm::models::{Backend, ConnectSettings, IdStrategy};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub age: i32,
}

aero_orm::impl_entity! {
    User => "User" {
        id: Option<i64> [id(IdStrategy::AutoIncrement)],
        name: String,
        age: i32,
    }
}

/// Create a SQLite database file that outlives the test's temp handle.
pub fn temp_sqlite_url() -> String {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    format!("sqlite:{}", db_path)
}

pub fn sqlite_config(url: &str) -> Config {
    Config {
        pool_size: 2,
        ..Config::for_url(url)
    }
}

pub async fn sqlite_pool(url: &str, size: usize) -> Arc<ConnectionPool> {
    ConnectionPool::open(
        ConnectSettings::new(Backend::SQLite, url),
        size,
        Duration::from_secs(2),
    )
    .await
    .unwrap()
}

/// Run raw SQL on a pooled connection.
pub async fn exec(pool: &ConnectionPool, sql: &str) {
    let mut conn = pool.acquire().await.unwrap();
    conn.execute(sql, &[]).await.unwrap();
    pool.release(conn);
}

/// Column names of a SQLite table, in declaration order.
pub async fn sqlite_columns(pool: &ConnectionPool, table: &str) -> Vec<String> {
    let mut conn = pool.acquire().await.unwrap();
    let rows = conn
        .fetch_all(&format!("SELECT name FROM pragma_table_info('{}')", table), &[])
        .await
        .unwrap();
    pool.release(conn);
    rows.iter()
        .map(|row| row.get("name").unwrap().to_string())
        .collect()
}
