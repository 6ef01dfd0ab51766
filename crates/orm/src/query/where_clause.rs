//! Query Builder WHERE clause operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add a `column <operator> ?` predicate. Predicates are ANDed in call order.
    ///
    /// The operator is checked against [`QueryOperator`] at render time.
    pub fn where_op<V: Into<Value>>(mut self, column: &str, operator: &str, value: V) -> Self {
        self.predicates.push(Predicate {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
        });
        self
    }

    /// Add WHERE column = value
    pub fn where_eq<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.where_op(column, "=", value)
    }

    /// Add WHERE column != value
    pub fn where_ne<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.where_op(column, "!=", value)
    }

    /// Add WHERE column LIKE pattern
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, "LIKE", pattern)
    }
}
