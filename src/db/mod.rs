//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Single-connection statement execution
//! - Connection pool management
//! - Type mappings
//! - Schema synchronization

pub mod executor;
pub mod pool;
pub mod schema;
pub mod types;

pub use executor::{DbConnection, DbRow, ExecOutcome};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use schema::{SchemaSynchronizer, SyncOutcome, add_column_sql, create_table_sql};
pub use types::{column_type, map_type};
