//! Aero ORM Library
//!
//! A small ORM engine: entity structs are mapped onto tables that are created
//! or patched at startup, and repositories declared with
//! [`repository!`] run generated INSERT, UPDATE, DELETE and SELECT statements
//! over a pool of connections (MySQL, or SQLite for local use).

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod orm;

pub use config::{Config, DispatchOptions, ExecutionErrorMode, UnboundedMutationMode};
pub use error::{DbError, DbResult};
pub use models::{Entity, IdStrategy};
pub use orm::{BeanRegistry, InMemoryRegistry, OrmService, Repository, RepositoryAdapter};
