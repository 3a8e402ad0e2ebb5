//! Repository method dispatch.
//!
//! A [`Repository`] answers calls to the methods of one [`RepositoryDescriptor`].
//! Each call:
//! 1. looks up the method and checks the argument count
//! 2. builds the WHERE conditions from condition-bound arguments, in order
//! 3. builds the SET list from column-bound arguments (UPDATE only)
//! 4. generates the statement for the method's verb
//! 5. executes it on a pooled connection and maps rows for queries
//! 6. coerces the outcome into the declared [`ReturnShape`]
//!
//! Acquire failures and mapping failures always reach the caller. Statement
//! failures follow [`ExecutionErrorMode`].

use crate::config::{DispatchOptions, ExecutionErrorMode};
use crate::db::{ConnectionPool, DbRow, ExecOutcome};
use crate::error::{DbError, DbResult};
use crate::models::{
    Argument, Entity, MethodDescriptor, ParamBinding, RepositoryDescriptor, ReturnShape, Verb,
};
use crate::orm::guard;
use crate::orm::mapper::ResultMapper;
use crate::orm::sql::{ConditionClause, GeneratedStatement, SqlBuilder, UpdateMap};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The coerced result of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned<E> {
    Unit,
    Flag(bool),
    Key(i64),
    Count(u64),
    Entity(E),
    Optional(Option<E>),
    List(Vec<E>),
}

impl<E> Returned<E> {
    /// Value returned in place of a failed statement or an absent row.
    pub fn benign(shape: ReturnShape) -> Self
    where
        E: Default,
    {
        match shape {
            ReturnShape::Unit => Self::Unit,
            ReturnShape::Flag => Self::Flag(false),
            ReturnShape::Key => Self::Key(0),
            ReturnShape::Count => Self::Count(0),
            ReturnShape::Entity => Self::Entity(E::default()),
            ReturnShape::Optional => Self::Optional(None),
            ReturnShape::List => Self::List(Vec::new()),
        }
    }

    pub fn shape(&self) -> ReturnShape {
        match self {
            Self::Unit => ReturnShape::Unit,
            Self::Flag(_) => ReturnShape::Flag,
            Self::Key(_) => ReturnShape::Key,
            Self::Count(_) => ReturnShape::Count,
            Self::Entity(_) => ReturnShape::Entity,
            Self::Optional(_) => ReturnShape::Optional,
            Self::List(_) => ReturnShape::List,
        }
    }

    fn mismatch(self, expected: ReturnShape) -> DbError {
        DbError::internal(format!(
            "Expected a {:?} result, got {:?}",
            expected,
            self.shape()
        ))
    }

    pub fn into_unit(self) -> DbResult<()> {
        match self {
            Self::Unit => Ok(()),
            other => Err(other.mismatch(ReturnShape::Unit)),
        }
    }

    pub fn into_flag(self) -> DbResult<bool> {
        match self {
            Self::Flag(v) => Ok(v),
            other => Err(other.mismatch(ReturnShape::Flag)),
        }
    }

    pub fn into_key(self) -> DbResult<i64> {
        match self {
            Self::Key(v) => Ok(v),
            other => Err(other.mismatch(ReturnShape::Key)),
        }
    }

    pub fn into_count(self) -> DbResult<u64> {
        match self {
            Self::Count(v) => Ok(v),
            other => Err(other.mismatch(ReturnShape::Count)),
        }
    }

    pub fn into_entity(self) -> DbResult<E> {
        match self {
            Self::Entity(v) => Ok(v),
            other => Err(other.mismatch(ReturnShape::Entity)),
        }
    }

    pub fn into_optional(self) -> DbResult<Option<E>> {
        match self {
            Self::Optional(v) => Ok(v),
            other => Err(other.mismatch(ReturnShape::Optional)),
        }
    }

    pub fn into_list(self) -> DbResult<Vec<E>> {
        match self {
            Self::List(v) => Ok(v),
            other => Err(other.mismatch(ReturnShape::List)),
        }
    }
}

/// What a statement produced before shape coercion.
enum Executed {
    Rows(Vec<DbRow>),
    Mutation(ExecOutcome),
}

/// Dispatches calls for one repository over entity `E`.
pub struct Repository<E> {
    descriptor: Arc<RepositoryDescriptor>,
    pool: Arc<ConnectionPool>,
    options: DispatchOptions,
    index: HashMap<String, usize>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    /// Bind a descriptor to a pool.
    ///
    /// The descriptor must target the table of `E`.
    pub fn new(
        pool: Arc<ConnectionPool>,
        descriptor: Arc<RepositoryDescriptor>,
        options: DispatchOptions,
    ) -> DbResult<Self> {
        let entity = E::descriptor()?;
        if entity.table != descriptor.table {
            return Err(DbError::invalid_declaration(
                format!(
                    "Repository targets table '{}' but the entity maps to '{}'",
                    descriptor.table, entity.table
                ),
                &descriptor.name,
            ));
        }

        let index = descriptor
            .methods
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();

        Ok(Self {
            descriptor,
            pool,
            options,
            index,
            _entity: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &RepositoryDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Call `method` with positional arguments.
    pub async fn invoke(&self, method: &str, args: Vec<Argument>) -> DbResult<Returned<E>> {
        let decl = self.method(method)?;
        if args.len() != decl.params.len() {
            return Err(DbError::invalid_input(format!(
                "{}::{} takes {} argument(s), got {}",
                self.name(),
                method,
                decl.params.len(),
                args.len()
            )));
        }

        let Some(stmt) = self.statement(decl, args)? else {
            info!(
                repository = %self.name(),
                method = %method,
                "Nothing updated: no column bound"
            );
            return Ok(Returned::benign(decl.returns));
        };

        guard::enforce(
            &stmt,
            self.options.unbounded_mutations,
            self.name(),
            method,
        )?;

        let mut conn = self.pool.acquire().await?;
        let result = match decl.verb {
            Verb::Query => conn.fetch_all(&stmt.sql, &stmt.params).await.map(Executed::Rows),
            _ => conn
                .execute(&stmt.sql, &stmt.params)
                .await
                .map(Executed::Mutation),
        };
        self.pool.release(conn);

        match result {
            Ok(executed) => {
                debug!(repository = %self.name(), method = %method, "Statement executed");
                Self::coerce(decl.returns, executed)
            }
            Err(e) => self.on_failure(decl, &stmt, e),
        }
    }

    fn method(&self, name: &str) -> DbResult<&MethodDescriptor> {
        self.index
            .get(name)
            .and_then(|&i| self.descriptor.methods.get(i))
            .ok_or_else(|| DbError::method_not_found(self.name(), name))
    }

    /// Generate the statement for a call. `None` means an UPDATE with nothing to set.
    fn statement(
        &self,
        decl: &MethodDescriptor,
        args: Vec<Argument>,
    ) -> DbResult<Option<GeneratedStatement>> {
        let table = self.descriptor.table.as_str();
        let conditions = self.conditions(decl, &args)?;

        let stmt = match decl.verb {
            Verb::Insert => {
                let Some(Argument::Object(fields)) = args.into_iter().next() else {
                    return Err(DbError::invalid_input(format!(
                        "{}::{} expects an entity as its first argument",
                        self.name(),
                        decl.name
                    )));
                };
                SqlBuilder::insert(table, &fields)
            }
            Verb::Delete => SqlBuilder::delete(table, &conditions),
            Verb::Update => {
                let assignments = self.assignments(decl, args)?;
                match SqlBuilder::update(table, &assignments, &conditions) {
                    Some(stmt) => stmt,
                    None => return Ok(None),
                }
            }
            Verb::Query => SqlBuilder::select(table, &conditions),
        };
        Ok(Some(stmt))
    }

    fn conditions(&self, decl: &MethodDescriptor, args: &[Argument]) -> DbResult<ConditionClause> {
        let mut clause = ConditionClause::new();
        for (binding, arg) in decl.params.iter().zip(args) {
            let ParamBinding::Condition { column, kind } = binding else {
                continue;
            };
            match arg {
                Argument::Value(value) => clause.push(column, *kind, value.clone()),
                Argument::Object(_) => {
                    return Err(DbError::invalid_input(format!(
                        "{}::{}: condition on '{}' needs a scalar argument",
                        self.name(),
                        decl.name,
                        column
                    )));
                }
            }
        }
        Ok(clause)
    }

    fn assignments(&self, decl: &MethodDescriptor, args: Vec<Argument>) -> DbResult<UpdateMap> {
        let mut map = UpdateMap::new();
        for (binding, arg) in decl.params.iter().zip(args) {
            match (binding, arg) {
                (ParamBinding::Column { column }, Argument::Value(value)) => map.set(column, value),
                // Objects decompose field by field; the declared column name is ignored.
                (ParamBinding::Column { .. } | ParamBinding::Fields, Argument::Object(fields)) => {
                    for (name, value) in fields {
                        map.set(&name, value);
                    }
                }
                (ParamBinding::Fields, Argument::Value(_)) => {
                    return Err(DbError::invalid_input(format!(
                        "{}::{}: field binding needs an entity argument",
                        self.name(),
                        decl.name
                    )));
                }
                _ => {}
            }
        }
        Ok(map)
    }

    fn coerce(shape: ReturnShape, executed: Executed) -> DbResult<Returned<E>> {
        let returned = match (shape, executed) {
            (ReturnShape::List, Executed::Rows(rows)) => {
                Returned::List(ResultMapper::map_rows(&rows)?)
            }
            (ReturnShape::Entity, Executed::Rows(rows)) => Returned::Entity(match rows.first() {
                Some(row) => ResultMapper::map_row(row)?,
                None => E::default(),
            }),
            (ReturnShape::Optional, Executed::Rows(rows)) => Returned::Optional(
                rows.first().map(ResultMapper::map_row).transpose()?,
            ),
            (ReturnShape::Unit, _) => Returned::Unit,
            (ReturnShape::Flag, _) => Returned::Flag(true),
            (ReturnShape::Key, Executed::Mutation(outcome)) => {
                Returned::Key(outcome.last_insert_id.unwrap_or(0))
            }
            (ReturnShape::Count, Executed::Mutation(outcome)) => {
                Returned::Count(outcome.rows_affected)
            }
            (shape, _) => {
                return Err(DbError::internal(format!(
                    "Cannot produce {:?} from this statement",
                    shape
                )));
            }
        };
        Ok(returned)
    }

    fn on_failure(
        &self,
        decl: &MethodDescriptor,
        stmt: &GeneratedStatement,
        err: DbError,
    ) -> DbResult<Returned<E>> {
        match self.options.execution_errors {
            ExecutionErrorMode::Propagate => Err(err),
            ExecutionErrorMode::Swallow => {
                error!(
                    repository = %self.name(),
                    method = %decl.name,
                    sql = %stmt.sql,
                    error = %err,
                    "Statement failed"
                );
                Ok(Returned::benign(decl.returns))
            }
        }
    }
}

impl<E> PartialEq for Repository<E> {
    /// Two handles are equal only if they are the same adapter.
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<E> std::fmt::Display for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on {} ({} methods)",
            self.descriptor.name,
            self.descriptor.table,
            self.descriptor.methods.len()
        )
    }
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.descriptor.name)
            .field("table", &self.descriptor.table)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
