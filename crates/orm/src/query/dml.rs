//! Query Builder DML operations (INSERT, UPDATE, DELETE)

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

/// Insert or replace a column in an ordered column/value list
fn upsert_pair(pairs: &mut Vec<(String, Value)>, column: String, value: Value) {
    match pairs.iter_mut().find(|(existing, _)| *existing == column) {
        Some((_, slot)) => *slot = value,
        None => pairs.push((column, value)),
    }
}

impl QueryBuilder {
    /// Start an INSERT query
    pub fn insert_into(mut self, table: &str) -> Self {
        if !matches!(self.kind, QueryKind::Insert { .. }) {
            self.switch_kind(QueryKind::Insert { values: Vec::new() });
        }
        self.table = Some(table.to_string());
        self
    }

    /// Start an UPDATE query
    pub fn update(mut self, table: &str) -> Self {
        if !matches!(self.kind, QueryKind::Update { .. }) {
            self.switch_kind(QueryKind::Update {
                assignments: Vec::new(),
            });
        }
        self.table = Some(table.to_string());
        self
    }

    /// Start a DELETE query
    pub fn delete(mut self) -> Self {
        if !matches!(self.kind, QueryKind::Delete) {
            self.switch_kind(QueryKind::Delete);
        }
        self
    }

    /// Column values for an INSERT. Later values for the same column win.
    pub fn values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if !matches!(self.kind, QueryKind::Insert { .. }) {
            self.switch_kind(QueryKind::Insert { values: Vec::new() });
        }
        if let QueryKind::Insert { values: existing } = &mut self.kind {
            for (column, value) in values {
                upsert_pair(existing, column.into(), value.into());
            }
        }
        self
    }

    /// Assign a column value for an UPDATE
    pub fn set<V: Into<Value>>(mut self, column: &str, value: V) -> Self {
        if !matches!(self.kind, QueryKind::Update { .. }) {
            self.switch_kind(QueryKind::Update {
                assignments: Vec::new(),
            });
        }
        if let QueryKind::Update { assignments } = &mut self.kind {
            upsert_pair(assignments, column.to_string(), value.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_before_insert_into_are_kept() {
        let query = QueryBuilder::new()
            .values([("name", json!("Launch"))])
            .insert_into("framework_epics");

        assert_eq!(query.table(), Some("framework_epics"));
        assert_eq!(
            query.kind,
            QueryKind::Insert {
                values: vec![("name".to_string(), json!("Launch"))]
            }
        );
    }

    #[test]
    fn test_set_replaces_repeated_column() {
        let query = QueryBuilder::new()
            .update("framework_tasks")
            .set("status", "open")
            .set("priority", 2)
            .set("status", "done");

        assert_eq!(
            query.kind,
            QueryKind::Update {
                assignments: vec![
                    ("status".to_string(), json!("done")),
                    ("priority".to_string(), json!(2)),
                ]
            }
        );
    }
}
