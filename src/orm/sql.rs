//! SQL text generation.
//!
//! Statements use positional `?` placeholders only. Table and column names come
//! from validated metadata and are spliced in verbatim; every value travels as a
//! bound parameter, in placeholder order.

use crate::models::{MatchKind, SqlValue};

/// Kind of generated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
}

/// A statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStatement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<SqlValue>,
    conditioned: bool,
}

impl GeneratedStatement {
    fn new(kind: StatementKind, sql: String, params: Vec<SqlValue>, conditioned: bool) -> Self {
        Self {
            kind,
            sql,
            params,
            conditioned,
        }
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    /// Whether this is an UPDATE or DELETE that reaches every row.
    pub fn is_unbounded(&self) -> bool {
        matches!(self.kind, StatementKind::Update | StatementKind::Delete) && !self.conditioned
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    column: String,
    kind: MatchKind,
    value: SqlValue,
}

/// Ordered WHERE conditions joined with `AND`.
///
/// Rendering order and value order always match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionClause {
    conditions: Vec<Condition>,
}

impl ConditionClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition. LIKE values are wrapped as `%value%`.
    pub fn push(&mut self, column: &str, kind: MatchKind, value: SqlValue) {
        let value = match kind {
            MatchKind::Equal => value,
            MatchKind::Like => value.like_pattern(),
        };
        self.conditions.push(Condition {
            column: column.to_string(),
            kind,
            value,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// `a = ? AND b LIKE ?`, or `None` when there are no conditions.
    pub fn render(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|c| format!("{} {} ?", c.column, c.kind.operator()))
            .collect();
        Some(parts.join(" AND "))
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.conditions.iter().map(|c| &c.value)
    }
}

/// Ordered SET assignments of an UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMap {
    entries: Vec<(String, SqlValue)>,
}

impl UpdateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `column`. Rebinding replaces the value and keeps the first position.
    pub fn set(&mut self, column: &str, value: SqlValue) {
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Builds the four statement shapes the dispatcher needs.
pub struct SqlBuilder;

impl SqlBuilder {
    /// `INSERT INTO t (a,b,c) VALUES (?,?,?)` over every given field, in order.
    pub fn insert(table: &str, fields: &[(String, SqlValue)]) -> GeneratedStatement {
        let columns: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        let placeholders = vec!["?"; fields.len()];
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(","),
            placeholders.join(",")
        );
        let params = fields.iter().map(|(_, value)| value.clone()).collect();
        GeneratedStatement::new(StatementKind::Insert, sql, params, false)
    }

    /// `DELETE FROM t[ WHERE ...]`.
    pub fn delete(table: &str, conditions: &ConditionClause) -> GeneratedStatement {
        let mut sql = format!("DELETE FROM {}", table);
        append_where(&mut sql, conditions);
        GeneratedStatement::new(
            StatementKind::Delete,
            sql,
            conditions.values().cloned().collect(),
            !conditions.is_empty(),
        )
    }

    /// `UPDATE t SET a = ?, b = ?[ WHERE ...]`, or `None` when nothing is assigned.
    ///
    /// Parameters are the assigned values followed by the condition values.
    pub fn update(
        table: &str,
        assignments: &UpdateMap,
        conditions: &ConditionClause,
    ) -> Option<GeneratedStatement> {
        if assignments.is_empty() {
            return None;
        }

        let sets: Vec<String> = assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        append_where(&mut sql, conditions);

        let params = assignments
            .iter()
            .map(|(_, value)| value.clone())
            .chain(conditions.values().cloned())
            .collect();
        Some(GeneratedStatement::new(
            StatementKind::Update,
            sql,
            params,
            !conditions.is_empty(),
        ))
    }

    /// `SELECT * FROM t[ WHERE ...]`.
    pub fn select(table: &str, conditions: &ConditionClause) -> GeneratedStatement {
        let mut sql = format!("SELECT * FROM {}", table);
        append_where(&mut sql, conditions);
        GeneratedStatement::new(
            StatementKind::Select,
            sql,
            conditions.values().cloned().collect(),
            !conditions.is_empty(),
        )
    }
}

fn append_where(sql: &mut String, conditions: &ConditionClause) {
    if let Some(clause) = conditions.render() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
}
