//! Data models for the ORM engine.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod entity;
pub mod repository;
pub mod value;

// Re-export commonly used types
pub use connection::{Backend, ConnectSettings};
pub use entity::{
    Entity, EntityDescriptor, EntityMeta, EntityMetaBuilder, Field, FieldDescriptor, FieldType,
    IdStrategy,
};
pub use repository::{
    Argument, IntoArgument, MatchKind, MethodBuilder, MethodDescriptor, ParamBinding,
    RepositoryDescriptor, ReturnShape, Verb,
};
pub use value::{ColumnValue, DATETIME_FORMAT, SqlValue, ValueError};
