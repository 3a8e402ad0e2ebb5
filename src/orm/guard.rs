//! Guard for mutations that reach every row.
//!
//! A generated DELETE or UPDATE without a WHERE clause is either run with a
//! warning or refused before it reaches the database, depending on
//! [`UnboundedMutationMode`].

use crate::config::UnboundedMutationMode;
use crate::error::{DbError, DbResult};
use crate::orm::sql::{GeneratedStatement, StatementKind};
use tracing::warn;

/// Type of unbounded mutation detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerousOperationType {
    /// DELETE without WHERE clause
    DeleteWithoutWhere,
    /// UPDATE without WHERE clause
    UpdateWithoutWhere,
}

impl DangerousOperationType {
    /// Get the operation name for error messages.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::DeleteWithoutWhere => "DELETE without WHERE",
            Self::UpdateWithoutWhere => "UPDATE without WHERE",
        }
    }

    /// Get the reason why this operation is dangerous.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DeleteWithoutWhere => "This will delete all rows from the table",
            Self::UpdateWithoutWhere => "This will update all rows in the table",
        }
    }
}

/// Classify a generated statement.
pub fn check_statement(stmt: &GeneratedStatement) -> Option<DangerousOperationType> {
    if !stmt.is_unbounded() {
        return None;
    }
    match stmt.kind {
        StatementKind::Delete => Some(DangerousOperationType::DeleteWithoutWhere),
        StatementKind::Update => Some(DangerousOperationType::UpdateWithoutWhere),
        StatementKind::Insert | StatementKind::Select => None,
    }
}

/// Apply the unbounded-mutation policy to a statement about to run.
pub fn enforce(
    stmt: &GeneratedStatement,
    mode: UnboundedMutationMode,
    repository: &str,
    method: &str,
) -> DbResult<()> {
    let Some(operation) = check_statement(stmt) else {
        return Ok(());
    };

    match mode {
        UnboundedMutationMode::Warn => {
            warn!(
                repository = %repository,
                method = %method,
                sql = %stmt.sql,
                operation = operation.operation_name(),
                "{}",
                operation.reason()
            );
            Ok(())
        }
        UnboundedMutationMode::Reject => Err(DbError::dangerous_operation_blocked(
            operation.operation_name(),
            operation.reason(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchKind, SqlValue};
    use crate::orm::sql::{ConditionClause, SqlBuilder, UpdateMap};

    #[test]
    fn test_delete_without_where_detected() {
        let stmt = SqlBuilder::delete("User", &ConditionClause::new());
        assert_eq!(
            check_statement(&stmt),
            Some(DangerousOperationType::DeleteWithoutWhere)
        );
    }

    #[test]
    fn test_update_without_where_detected() {
        let mut sets = UpdateMap::new();
        sets.set("age", SqlValue::Int(1));
        let stmt = SqlBuilder::update("User", &sets, &ConditionClause::new()).unwrap();
        assert_eq!(
            check_statement(&stmt),
            Some(DangerousOperationType::UpdateWithoutWhere)
        );
    }

    #[test]
    fn test_conditioned_and_select_are_safe() {
        let mut clause = ConditionClause::new();
        clause.push("id", MatchKind::Equal, SqlValue::Int(1));
        assert_eq!(check_statement(&SqlBuilder::delete("User", &clause)), None);
        assert_eq!(
            check_statement(&SqlBuilder::select("User", &ConditionClause::new())),
            None
        );
    }

    #[test]
    fn test_enforce_modes() {
        let stmt = SqlBuilder::delete("User", &ConditionClause::new());
        assert!(enforce(&stmt, UnboundedMutationMode::Warn, "Repo", "purge").is_ok());

        let err = enforce(&stmt, UnboundedMutationMode::Reject, "Repo", "purge").unwrap_err();
        assert!(matches!(err, DbError::DangerousOperationBlocked { .. }));
        assert!(err.to_string().contains("DELETE without WHERE"));
    }
}
