//! Query Builder SQL generation
//!
//! Rendering validates every identifier against an [`AllowList`] and turns
//! every value into a `?` placeholder. Any failure aborts the render, so an
//! invalid query produces no SQL text at all.

use serde_json::Value;
use tracing::debug;

use super::builder::QueryBuilder;
use super::types::*;
use crate::error::{OrmError, OrmResult};
use crate::security::AllowList;

impl QueryBuilder {
    /// Render against the application allow-list
    pub fn build(&self) -> OrmResult<(String, Vec<Value>)> {
        self.build_with(AllowList::application())
    }

    /// Render to parameterized SQL and its ordered parameter list
    pub fn build_with(&self, allow: &AllowList) -> OrmResult<(String, Vec<Value>)> {
        if let Some(conflict) = &self.kind_conflict {
            return Err(OrmError::invalid_input(conflict.clone()));
        }
        self.ensure_clauses_supported()?;

        let table = self.table.as_deref().ok_or_else(|| {
            OrmError::invalid_input("query has no target table; call from_table, insert_into or update")
        })?;
        let table = allow.validate_table(table)?;

        let mut params = Vec::new();
        let sql = match &self.kind {
            QueryKind::Select { columns } => {
                self.build_select_sql(allow, &table, columns, &mut params)?
            }
            QueryKind::Insert { values } => Self::build_insert_sql(allow, &table, values, &mut params)?,
            QueryKind::Update { assignments } => {
                self.build_update_sql(allow, &table, assignments, &mut params)?
            }
            QueryKind::Delete => {
                let mut sql = format!("DELETE FROM {}", table);
                self.build_where_clause(allow, &mut sql, &mut params)?;
                sql
            }
        };

        debug!(sql = %sql, params = params.len(), "rendered query");
        Ok((sql, params))
    }

    /// Reject clauses the statement kind would otherwise drop
    fn ensure_clauses_supported(&self) -> OrmResult<()> {
        let is_select = matches!(self.kind, QueryKind::Select { .. });
        let is_insert = matches!(self.kind, QueryKind::Insert { .. });
        let clauses = [
            ("JOIN", !is_select && !self.joins.is_empty()),
            ("ORDER BY", !is_select && !self.order_by.is_empty()),
            ("LIMIT", !is_select && self.limit_count.is_some()),
            ("WHERE", is_insert && !self.predicates.is_empty()),
        ];

        match clauses.iter().find(|(_, unsupported)| *unsupported) {
            Some((clause, _)) => Err(OrmError::invalid_input(format!(
                "{} does not support {}",
                self.kind.keyword(),
                clause
            ))),
            None => Ok(()),
        }
    }

    fn build_select_sql(
        &self,
        allow: &AllowList,
        table: &str,
        columns: &[String],
        params: &mut Vec<Value>,
    ) -> OrmResult<String> {
        let mut sql = String::from("SELECT ");

        if columns.is_empty() {
            sql.push('*');
        } else {
            let rendered = columns
                .iter()
                .map(|column| {
                    if column == "*" {
                        Ok(column.clone())
                    } else {
                        allow.validate_column(column)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(&rendered.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(table);

        for join in &self.joins {
            let join_table = allow.validate_table(&join.table)?;
            sql.push_str(&format!(" {} {} ON {}", join.join_type, join_table, join.condition));
        }

        self.build_where_clause(allow, &mut sql, params)?;

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(column, direction)| {
                    allow
                        .validate_column(column)
                        .map(|column| format!("{} {}", column, direction))
                })
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        // Safe to interpolate: u64 by construction
        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(sql)
    }

    fn build_insert_sql(
        allow: &AllowList,
        table: &str,
        values: &[(String, Value)],
        params: &mut Vec<Value>,
    ) -> OrmResult<String> {
        if values.is_empty() {
            return Err(OrmError::invalid_input("INSERT requires at least one column value"));
        }

        let mut columns = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(allow.validate_column(column)?);
            params.push(value.clone());
        }
        let placeholders = vec!["?"; columns.len()].join(", ");

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        ))
    }

    fn build_update_sql(
        &self,
        allow: &AllowList,
        table: &str,
        assignments: &[(String, Value)],
        params: &mut Vec<Value>,
    ) -> OrmResult<String> {
        if assignments.is_empty() {
            return Err(OrmError::invalid_input("UPDATE requires at least one assignment"));
        }

        let mut set_clauses = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            set_clauses.push(format!("{} = ?", allow.validate_column(column)?));
            params.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", table, set_clauses.join(", "));
        self.build_where_clause(allow, &mut sql, params)?;
        Ok(sql)
    }

    /// Helper method to build WHERE clauses
    fn build_where_clause(
        &self,
        allow: &AllowList,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> OrmResult<()> {
        if self.predicates.is_empty() {
            return Ok(());
        }

        let mut conditions = Vec::with_capacity(self.predicates.len());
        for predicate in &self.predicates {
            let column = allow.validate_column(&predicate.column)?;
            let operator: QueryOperator = predicate.operator.parse()?;
            conditions.push(format!("{} {} ?", column, operator));
            params.push(predicate.value.clone());
        }

        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
        Ok(())
    }
}
