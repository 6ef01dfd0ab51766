//! Query Builder - Core builder implementation
//!
//! The builder only accumulates intent. Nothing is validated until
//! [`QueryBuilder::build`] renders it.

use super::types::*;

/// Query builder for constructing SELECT/INSERT/UPDATE/DELETE statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    pub(crate) kind: QueryKind,
    pub(crate) table: Option<String>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) kind_conflict: Option<String>,
}

impl QueryBuilder {
    /// Create a new query builder (an empty SELECT)
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement kind and its payload
    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Target table as written by the caller
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Replace the statement kind. Only a blank SELECT (the starting state)
    /// is replaced silently; anything else is reported when rendering.
    pub(crate) fn switch_kind(&mut self, next: QueryKind) {
        let blank = matches!(&self.kind, QueryKind::Select { columns } if columns.is_empty());
        if !blank && self.kind_conflict.is_none() {
            self.kind_conflict = Some(format!(
                "cannot switch {} query to {}",
                self.kind.keyword(),
                next.keyword()
            ));
        }
        self.kind = next;
    }
}

/// Start a SELECT of the given columns
pub fn select<I, S>(columns: I) -> QueryBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    QueryBuilder::new().select(columns)
}

/// Start an INSERT into `table`
pub fn insert_into(table: &str) -> QueryBuilder {
    QueryBuilder::new().insert_into(table)
}

/// Start an UPDATE of `table`
pub fn update(table: &str) -> QueryBuilder {
    QueryBuilder::new().update(table)
}

/// Start a DELETE; pick the table with `from_table`
pub fn delete() -> QueryBuilder {
    QueryBuilder::new().delete()
}
