//! Repository metadata.
//!
//! A repository declaration lists the methods of one data-access capability. Each method
//! carries exactly one [`Verb`], a [`ReturnShape`] and the binding of every parameter.
//! Declarations are checked once, when the descriptor is built, and are read-only afterwards.

use crate::error::{DbError, DbResult};
use crate::models::entity::{Entity, check_identifier};
use crate::models::value::{ColumnValue, SqlValue};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use uuid::Uuid;

/// Statement kind a method turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Insert,
    Update,
    Delete,
    Query,
}

impl Verb {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Query => "QUERY",
        }
    }

    /// Return shapes this verb can produce.
    pub fn supports(&self, shape: ReturnShape) -> bool {
        use ReturnShape::*;
        match self {
            Self::Insert => matches!(shape, Unit | Flag | Key),
            Self::Update | Self::Delete => matches!(shape, Unit | Flag | Count),
            Self::Query => matches!(shape, Entity | Optional | List),
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Declared return type of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// Nothing.
    Unit,
    /// Whether the statement ran.
    Flag,
    /// Generated identifier of an inserted row.
    Key,
    /// Rows affected by an update or delete.
    Count,
    /// One entity, or the zero-valued entity when nothing matched.
    Entity,
    /// One entity or none.
    Optional,
    /// Every matching entity, in row order.
    List,
}

/// How a condition parameter is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchKind {
    #[default]
    Equal,
    Like,
}

impl MatchKind {
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Like => "LIKE",
        }
    }
}

/// What a parameter contributes to the generated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    /// `column <op> ?` in the WHERE clause.
    Condition { column: String, kind: MatchKind },
    /// `column = ?` in the SET list. An object argument is decomposed instead.
    Column { column: String },
    /// Decompose an object argument field by field into the SET list.
    Fields,
    /// Skipped.
    Unbound,
}

impl ParamBinding {
    pub fn cond(column: &str) -> Self {
        Self::Condition {
            column: column.to_string(),
            kind: MatchKind::Equal,
        }
    }

    pub fn like(column: &str) -> Self {
        Self::Condition {
            column: column.to_string(),
            kind: MatchKind::Like,
        }
    }

    pub fn column(column: &str) -> Self {
        Self::Column {
            column: column.to_string(),
        }
    }

    pub fn fields() -> Self {
        Self::Fields
    }

    pub fn unbound() -> Self {
        Self::Unbound
    }

    fn column_name(&self) -> Option<&str> {
        match self {
            Self::Condition { column, .. } | Self::Column { column } => Some(column),
            Self::Fields | Self::Unbound => None,
        }
    }
}

/// One declared repository method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub verb: Verb,
    pub returns: ReturnShape,
    pub params: Vec<ParamBinding>,
}

impl MethodDescriptor {
    pub fn builder(name: &str) -> MethodBuilder {
        MethodBuilder {
            name: name.to_string(),
            verbs: Vec::new(),
            returns: ReturnShape::Unit,
            params: Vec::new(),
        }
    }
}

/// Collects a method declaration; [`MethodBuilder::build`] enforces a single verb.
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    verbs: Vec<Verb>,
    returns: ReturnShape,
    params: Vec<ParamBinding>,
}

impl MethodBuilder {
    pub fn verb(mut self, verb: Verb) -> Self {
        self.verbs.push(verb);
        self
    }

    pub fn insert(self) -> Self {
        self.verb(Verb::Insert)
    }

    pub fn update(self) -> Self {
        self.verb(Verb::Update)
    }

    pub fn delete(self) -> Self {
        self.verb(Verb::Delete)
    }

    pub fn query(self) -> Self {
        self.verb(Verb::Query)
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    pub fn param(mut self, binding: ParamBinding) -> Self {
        self.params.push(binding);
        self
    }

    pub fn build(self) -> DbResult<MethodDescriptor> {
        let verb = match self.verbs.as_slice() {
            [verb] => *verb,
            [] => {
                return Err(DbError::invalid_declaration(
                    "Method declares no verb (expected one of Insert, Update, Delete, Query)",
                    &self.name,
                ));
            }
            verbs => {
                let names: Vec<&str> = verbs.iter().map(Verb::name).collect();
                return Err(DbError::invalid_declaration(
                    format!("Method declares several verbs: {}", names.join(", ")),
                    &self.name,
                ));
            }
        };

        if !verb.supports(self.returns) {
            return Err(DbError::invalid_declaration(
                format!("{} cannot return {:?}", verb, self.returns),
                &self.name,
            ));
        }

        if verb == Verb::Insert && self.params.is_empty() {
            return Err(DbError::invalid_declaration(
                "INSERT needs the entity as its first parameter",
                &self.name,
            ));
        }

        for binding in &self.params {
            if let Some(column) = binding.column_name() {
                check_identifier(column, &self.name)?;
            }
        }

        Ok(MethodDescriptor {
            name: self.name,
            verb,
            returns: self.returns,
            params: self.params,
        })
    }
}

/// Every method of one repository, over one entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub table: String,
    pub methods: Vec<MethodDescriptor>,
}

impl RepositoryDescriptor {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        methods: Vec<MethodDescriptor>,
    ) -> DbResult<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for method in &methods {
            if !seen.insert(method.name.as_str()) {
                return Err(DbError::invalid_declaration(
                    format!("Method '{}' is declared twice", method.name),
                    &name,
                ));
            }
        }

        Ok(Self {
            name,
            table: table.into(),
            methods,
        })
    }

    /// Descriptor for a repository over entity `E`.
    pub fn for_entity<E: Entity>(
        name: impl Into<String>,
        methods: Vec<MethodDescriptor>,
    ) -> DbResult<Self> {
        let table = E::descriptor()?.table.clone();
        Self::new(name, table, methods)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A basic scalar.
    Value(SqlValue),
    /// A composite value as `(field name, value)` pairs in declaration order.
    Object(Vec<(String, SqlValue)>),
}

impl Argument {
    /// Decompose an entity into an object argument.
    pub fn entity<E: Entity>(entity: &E) -> DbResult<Self> {
        Ok(Self::Object(E::meta()?.named_values(entity)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Object(_) => "object",
        }
    }
}

/// Conversion of a method argument into an [`Argument`].
pub trait IntoArgument {
    fn into_argument(self) -> DbResult<Argument>;
}

impl IntoArgument for Argument {
    fn into_argument(self) -> DbResult<Argument> {
        Ok(self)
    }
}

impl IntoArgument for SqlValue {
    fn into_argument(self) -> DbResult<Argument> {
        Ok(Argument::Value(self))
    }
}

impl IntoArgument for &str {
    fn into_argument(self) -> DbResult<Argument> {
        Ok(Argument::Value(SqlValue::Text(self.to_string())))
    }
}

macro_rules! impl_scalar_argument {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoArgument for $ty {
                fn into_argument(self) -> DbResult<Argument> {
                    Ok(Argument::Value(self.to_value()))
                }
            }

            impl IntoArgument for Option<$ty> {
                fn into_argument(self) -> DbResult<Argument> {
                    Ok(Argument::Value(self.to_value()))
                }
            }
        )+
    };
}

impl_scalar_argument!(
    String,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    bool,
    char,
    Uuid,
    NaiveDateTime
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_verb_required() {
        let err = MethodDescriptor::builder("find")
            .returns(ReturnShape::List)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no verb"));

        let err = MethodDescriptor::builder("confused")
            .insert()
            .query()
            .returns(ReturnShape::Unit)
            .param(ParamBinding::unbound())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("INSERT, QUERY"));
    }

    #[test]
    fn test_shape_must_fit_verb() {
        let err = MethodDescriptor::builder("find")
            .query()
            .returns(ReturnShape::Key)
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidDeclaration { .. }));

        assert!(
            MethodDescriptor::builder("purge")
                .delete()
                .returns(ReturnShape::Count)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_insert_needs_parameter() {
        let err = MethodDescriptor::builder("save")
            .insert()
            .returns(ReturnShape::Key)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("first parameter"));
    }

    #[test]
    fn test_binding_columns_are_identifiers() {
        let err = MethodDescriptor::builder("find")
            .query()
            .returns(ReturnShape::List)
            .param(ParamBinding::cond("name OR 1=1"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let find = MethodDescriptor::builder("find")
            .query()
            .returns(ReturnShape::List)
            .build()
            .unwrap();
        let err = RepositoryDescriptor::new("Repo", "T", vec![find.clone(), find]).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_match_kind_operator() {
        assert_eq!(MatchKind::Equal.operator(), "=");
        assert_eq!(MatchKind::Like.operator(), "LIKE");
    }

    #[test]
    fn test_scalar_arguments() {
        assert_eq!(
            "ada".into_argument().unwrap(),
            Argument::Value(SqlValue::Text("ada".to_string()))
        );
        assert_eq!(
            7i32.into_argument().unwrap(),
            Argument::Value(SqlValue::Int(7))
        );
        assert_eq!(
            None::<i64>.into_argument().unwrap(),
            Argument::Value(SqlValue::Null)
        );
    }
}
