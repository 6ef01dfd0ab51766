//! Query Builder SELECT, JOIN, ORDER BY and LIMIT operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::error::{OrmError, OrmResult};

impl QueryBuilder {
    /// Add SELECT columns. `"*"` selects every column.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into);
        if let QueryKind::Select { columns: existing } = &mut self.kind {
            existing.extend(columns);
        } else {
            self.switch_kind(QueryKind::Select {
                columns: columns.collect(),
            });
        }
        self
    }

    /// Set the table the statement reads from or deletes from
    pub fn from_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Add an INNER JOIN. The condition text is emitted as written.
    pub fn join(self, table: &str, condition: &str) -> Self {
        self.join_with(JoinType::Inner, table, condition)
    }

    /// Add a LEFT JOIN
    pub fn left_join(self, table: &str, condition: &str) -> Self {
        self.join_with(JoinType::Left, table, condition)
    }

    /// Add a JOIN of the given type
    pub fn join_with(mut self, join_type: JoinType, table: &str, condition: &str) -> Self {
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            condition: condition.to_string(),
        });
        self
    }

    /// Add ORDER BY clause (ascending)
    pub fn order_by(self, column: &str) -> Self {
        self.order_by_dir(column, OrderDirection::Asc)
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by_dir(column, OrderDirection::Desc)
    }

    pub fn order_by_dir(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add LIMIT clause from an untrusted signed count, rejecting negatives
    pub fn try_limit(self, count: i64) -> OrmResult<Self> {
        let count = u64::try_from(count).map_err(|_| {
            OrmError::invalid_input(format!("limit must be a non-negative integer, got {}", count))
        })?;
        Ok(self.limit(count))
    }
}
