//! The repository engine.
//!
//! - SQL generation for generated statements
//! - Row to entity mapping
//! - Method dispatch and the unbounded-mutation guard
//! - Engine startup and shutdown

pub mod dispatcher;
pub mod guard;
pub mod macros;
pub mod mapper;
pub mod service;
pub mod sql;

pub use dispatcher::{Repository, Returned};
pub use guard::{DangerousOperationType, check_statement};
pub use mapper::ResultMapper;
pub use service::{
    Bean, BeanRegistry, EntityDeclaration, EntitySync, InMemoryRegistry, OrmService,
    RepositoryAdapter, RepositoryDeclaration, RepositoryFailure,
};
pub use sql::{ConditionClause, GeneratedStatement, SqlBuilder, StatementKind, UpdateMap};
