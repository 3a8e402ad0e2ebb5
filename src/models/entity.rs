//! Entity metadata.
//!
//! An entity is a Rust struct mapped onto one table. Its shape is described once by an
//! [`EntityDescriptor`] (table name plus ordered fields) and its values are reached through
//! per-field accessors stored alongside in [`EntityMeta`]. Both are built the first time
//! the entity is used and never mutated afterwards.

use crate::error::{DbError, DbResult};
use crate::models::value::{ColumnValue, SqlValue, ValueError};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Semantic type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Char,
    /// Any type without a dedicated column keyword.
    Other(&'static str),
}

/// How the database produces identifier values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdStrategy {
    AutoIncrement,
    GeneratedUuid,
}

impl IdStrategy {
    /// MySQL column suffix placed before `PRIMARY KEY`.
    pub fn mysql_keyword(&self) -> &'static str {
        match self {
            Self::AutoIncrement => "AUTO_INCREMENT",
            Self::GeneratedUuid => "DEFAULT (UUID())",
        }
    }
}

/// Static description of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Explicit column type, used verbatim instead of the mapped type.
    pub column_type: Option<String>,
    pub id: Option<IdStrategy>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            column_type: None,
            id: None,
        }
    }

    pub fn with_column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn with_id(mut self, strategy: IdStrategy) -> Self {
        self.id = Some(strategy);
        self
    }

    pub fn is_identifier(&self) -> bool {
        self.id.is_some()
    }
}

/// Static description of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Build a descriptor, checking names and the identifier count.
    pub fn new(table: impl Into<String>, fields: Vec<FieldDescriptor>) -> DbResult<Self> {
        let table = table.into();
        check_identifier(&table, &table)?;

        let mut seen = HashSet::new();
        for field in &fields {
            check_identifier(&field.name, &table)?;
            if !seen.insert(field.name.as_str()) {
                return Err(DbError::invalid_declaration(
                    format!("Field '{}' is declared twice", field.name),
                    &table,
                ));
            }
        }

        if fields.iter().filter(|f| f.is_identifier()).count() > 1 {
            return Err(DbError::invalid_declaration(
                "At most one identifier field is allowed",
                &table,
            ));
        }

        Ok(Self { table, fields })
    }

    /// The identifier field, if one is declared.
    pub fn identifier(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_identifier())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Check that a table or column name is a plain SQL identifier.
///
/// Names are spliced into statement text, so anything but `[A-Za-z_][A-Za-z0-9_]*`
/// is refused when metadata is built.
pub fn check_identifier(name: &str, owner: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DbError::invalid_declaration(
            format!("'{}' is not a valid SQL identifier", name),
            owner,
        ))
    }
}

type ReadFn<E> = Box<dyn Fn(&E) -> SqlValue + Send + Sync>;
type WriteFn<E> = Box<dyn Fn(&mut E, SqlValue) -> Result<(), ValueError> + Send + Sync>;

/// A field descriptor paired with the accessors that read and assign it.
pub struct Field<E> {
    descriptor: FieldDescriptor,
    read: ReadFn<E>,
    write: WriteFn<E>,
}

impl<E: 'static> Field<E> {
    pub fn new<T: ColumnValue + 'static>(
        name: &str,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self {
            descriptor: FieldDescriptor::new(name, T::FIELD_TYPE),
            read: Box::new(move |entity| get(entity).to_value()),
            write: Box::new(move |entity, value| {
                *get_mut(entity) = T::from_value(value)?;
                Ok(())
            }),
        }
    }

    /// Mark this field as the identifier.
    pub fn id(mut self, strategy: IdStrategy) -> Self {
        self.descriptor.id = Some(strategy);
        self
    }

    /// Override the mapped column type.
    pub fn column_type(mut self, column_type: &str) -> Self {
        self.descriptor.column_type = Some(column_type.to_string());
        self
    }
}

/// Descriptor plus accessors for entity type `E`.
pub struct EntityMeta<E> {
    descriptor: EntityDescriptor,
    read: Vec<ReadFn<E>>,
    write: Vec<WriteFn<E>>,
}

impl<E> std::fmt::Debug for EntityMeta<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMeta")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> EntityMeta<E> {
    pub fn builder(table: &str) -> EntityMetaBuilder<E> {
        EntityMetaBuilder {
            table: table.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Field values of `entity` in descriptor order.
    pub fn values(&self, entity: &E) -> Vec<SqlValue> {
        self.read.iter().map(|read| read(entity)).collect()
    }

    /// `(field name, value)` pairs of `entity` in descriptor order.
    pub fn named_values(&self, entity: &E) -> Vec<(String, SqlValue)> {
        self.descriptor
            .fields
            .iter()
            .zip(&self.read)
            .map(|(field, read)| (field.name.clone(), read(entity)))
            .collect()
    }

    /// Assign the field at `index`.
    pub fn assign(&self, entity: &mut E, index: usize, value: SqlValue) -> DbResult<()> {
        let (Some(field), Some(write)) = (self.descriptor.fields.get(index), self.write.get(index))
        else {
            return Err(DbError::internal(format!(
                "Field index {} out of bounds for '{}'",
                index, self.descriptor.table
            )));
        };
        write(entity, value).map_err(|e| DbError::mapping(e.to_string(), &field.name))
    }
}

pub struct EntityMetaBuilder<E> {
    table: String,
    fields: Vec<Field<E>>,
}

impl<E: 'static> EntityMetaBuilder<E> {
    pub fn field(mut self, field: Field<E>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> DbResult<EntityMeta<E>> {
        let mut descriptors = Vec::with_capacity(self.fields.len());
        let mut read = Vec::with_capacity(self.fields.len());
        let mut write = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            descriptors.push(field.descriptor);
            read.push(field.read);
            write.push(field.write);
        }

        Ok(EntityMeta {
            descriptor: EntityDescriptor::new(self.table, descriptors)?,
            read,
            write,
        })
    }
}

/// A struct mapped onto a table.
///
/// Usually implemented with [`impl_entity!`](crate::impl_entity).
pub trait Entity: Default + Send + Sync + Sized + 'static {
    fn meta() -> DbResult<&'static EntityMeta<Self>>;

    fn descriptor() -> DbResult<&'static EntityDescriptor> {
        Self::meta().map(|meta| meta.descriptor())
    }
}

/// Resolve metadata cached in `cell`, building it on first use.
pub fn cached_meta<E: Entity>(
    cell: &'static OnceLock<DbResult<EntityMeta<E>>>,
    build: impl FnOnce() -> DbResult<EntityMeta<E>>,
) -> DbResult<&'static EntityMeta<E>> {
    match cell.get_or_init(build) {
        Ok(meta) => Ok(meta),
        Err(e) => Err(DbError::invalid_declaration(
            e.to_string(),
            std::any::type_name::<E>(),
        )),
    }
}

/// Implement [`Entity`] for a struct from a field list.
///
/// ```ignore
/// impl_entity! {
///     User => "User" {
///         id: Option<i64> [id(IdStrategy::AutoIncrement)],
///         name: String,
///         nickname: String [column_type("VARCHAR(64)")],
///         age: i32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_entity {
    (
        $entity:ident => $table:literal {
            $(
                $field:ident : $ty:ty $( [ $( $modifier:ident ( $( $arg:expr ),* ) ),* $(,)? ] )?
            ),* $(,)?
        }
    ) => {
        impl $crate::models::Entity for $entity {
            fn meta() -> $crate::error::DbResult<&'static $crate::models::EntityMeta<Self>> {
                static META: ::std::sync::OnceLock<
                    $crate::error::DbResult<$crate::models::EntityMeta<$entity>>,
                > = ::std::sync::OnceLock::new();

                $crate::models::entity::cached_meta(&META, || {
                    $crate::models::EntityMeta::<$entity>::builder($table)
                        $(
                            .field(
                                $crate::models::Field::<$entity>::new::<$ty>(
                                    stringify!($field),
                                    |e: &$entity| &e.$field,
                                    |e: &mut $entity| &mut e.$field,
                                )
                                $( $( .$modifier( $( $arg ),* ) )* )?
                            )
                        )*
                        .build()
                })
            }
        }

        impl $crate::models::IntoArgument for $entity {
            fn into_argument(self) -> $crate::error::DbResult<$crate::models::Argument> {
                $crate::models::Argument::entity(&self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Account {
        id: Option<i64>,
        owner: String,
        balance: f64,
        code: String,
    }

    crate::impl_entity! {
        Account => "Account" {
            id: Option<i64> [id(IdStrategy::AutoIncrement)],
            owner: String,
            balance: f64,
            code: String [column_type("CHAR(8)")],
        }
    }

    #[test]
    fn test_macro_builds_descriptor_in_order() {
        let descriptor = Account::descriptor().unwrap();
        assert_eq!(descriptor.table, "Account");
        let names: Vec<&str> = descriptor.field_names().collect();
        assert_eq!(names, vec!["id", "owner", "balance", "code"]);
        assert_eq!(descriptor.fields[2].field_type, FieldType::Float64);
        assert_eq!(descriptor.fields[3].column_type.as_deref(), Some("CHAR(8)"));
        assert_eq!(
            descriptor.identifier().map(|f| f.name.as_str()),
            Some("id")
        );
    }

    #[test]
    fn test_meta_reads_and_assigns_fields() {
        let meta = Account::meta().unwrap();
        let account = Account {
            id: Some(3),
            owner: "ada".to_string(),
            balance: 12.5,
            code: "AB".to_string(),
        };
        assert_eq!(
            meta.values(&account),
            vec![
                SqlValue::Int(3),
                SqlValue::Text("ada".to_string()),
                SqlValue::Float(12.5),
                SqlValue::Text("AB".to_string()),
            ]
        );

        let mut fresh = Account::default();
        meta.assign(&mut fresh, 1, SqlValue::Text("bob".to_string()))
            .unwrap();
        assert_eq!(fresh.owner, "bob");

        let err = meta
            .assign(&mut fresh, 2, SqlValue::Text("lots".to_string()))
            .unwrap_err();
        assert!(err.is_mapping());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let fields = vec![
            FieldDescriptor::new("a", FieldType::Text),
            FieldDescriptor::new("a", FieldType::Int32),
        ];
        let err = EntityDescriptor::new("T", fields).unwrap_err();
        assert!(matches!(err, DbError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_two_identifiers_rejected() {
        let fields = vec![
            FieldDescriptor::new("a", FieldType::Int64).with_id(IdStrategy::AutoIncrement),
            FieldDescriptor::new("b", FieldType::Text).with_id(IdStrategy::GeneratedUuid),
        ];
        assert!(EntityDescriptor::new("T", fields).is_err());
    }

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("user_id", "T").is_ok());
        assert!(check_identifier("_x1", "T").is_ok());
        assert!(check_identifier("1abc", "T").is_err());
        assert!(check_identifier("name; DROP TABLE x", "T").is_err());
        assert!(check_identifier("", "T").is_err());
    }
}
