//! Query Executor - runs rendered statements against a caller-owned connection
//!
//! The connection is borrowed for the duration of one call. Transactions opened
//! here are always committed or rolled back before returning.

use serde_json::{Map, Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Connection, Row, Sqlite, SqliteConnection, TypeInfo, ValueRef};
use tracing::{debug, warn};

use crate::error::{OrmError, OrmResult};

/// A fetched row keyed by column name
pub type JsonRow = Map<String, Value>;

/// Result of running one statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Rows returned by a read statement
    Rows(Vec<JsonRow>),
    /// Rows affected by a write statement
    Affected(u64),
}

impl QueryOutcome {
    pub fn rows(&self) -> &[JsonRow] {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Affected(_) => &[],
        }
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            QueryOutcome::Rows(_) => 0,
            QueryOutcome::Affected(count) => *count,
        }
    }
}

/// Run one statement
pub async fn execute(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> OrmResult<QueryOutcome> {
    run_statement(conn, sql, params).await
}

/// Run several statements atomically; any failure rolls back all of them
pub async fn execute_transaction(
    conn: &mut SqliteConnection,
    statements: &[(String, Vec<Value>)],
) -> OrmResult<Vec<QueryOutcome>> {
    for (_, params) in statements {
        check_params(params)?;
    }
    let mut tx = conn.begin().await?;

    let mut outcomes = Vec::with_capacity(statements.len());
    for (sql, params) in statements {
        match run_statement(&mut *tx, sql, params).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back transaction");
                }
                return Err(err);
            }
        }
    }

    tx.commit().await?;
    Ok(outcomes)
}

/// Run the same statement once per parameter set inside one transaction
///
/// Returns the total number of affected rows.
pub async fn execute_batch(
    conn: &mut SqliteConnection,
    sql: &str,
    param_sets: &[Vec<Value>],
) -> OrmResult<u64> {
    for params in param_sets {
        check_params(params)?;
    }
    let mut tx = conn.begin().await?;

    let mut affected = 0;
    for params in param_sets {
        match bind_params(sql, params).execute(&mut *tx).await {
            Ok(result) => affected += result.rows_affected(),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back batch");
                }
                return Err(err.into());
            }
        }
    }

    tx.commit().await?;
    debug!(statements = param_sets.len(), affected, "batch committed");
    Ok(affected)
}

async fn run_statement(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> OrmResult<QueryOutcome> {
    check_params(params)?;
    debug!(sql = %sql, params = params.len(), "executing statement");

    if is_read_statement(sql) {
        let rows = bind_params(sql, params).fetch_all(&mut *conn).await?;
        let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?;
        Ok(QueryOutcome::Rows(rows))
    } else {
        let result = bind_params(sql, params).execute(&mut *conn).await?;
        Ok(QueryOutcome::Affected(result.rows_affected()))
    }
}

/// Whether the statement yields rows: a read, or a write with `RETURNING`
fn is_read_statement(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    ["SELECT", "WITH", "PRAGMA", "EXPLAIN", "VALUES"]
        .iter()
        .any(|read| keyword.eq_ignore_ascii_case(read))
        || has_returning_clause(sql)
}

fn has_returning_clause(sql: &str) -> bool {
    // Even segments between single quotes are outside string literals
    sql.split('\'').step_by(2).any(|outside| {
        outside
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .any(|word| word.eq_ignore_ascii_case("RETURNING"))
    })
}

/// SQLite integers are signed 64-bit; larger JSON integers would bind as lossy floats
fn check_params(params: &[Value]) -> OrmResult<()> {
    let oversized = params.iter().find_map(|value| match value {
        Value::Number(number) if number.is_u64() && number.as_i64().is_none() => Some(number),
        _ => None,
    });
    match oversized {
        Some(number) => Err(OrmError::invalid_input(format!(
            "integer parameter {} is outside the signed 64-bit range",
            number
        ))),
        None => Ok(()),
    }
}

/// Bind JSON values positionally
pub(crate) fn bind_params<'q>(
    sql: &'q str,
    params: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params.iter().fold(sqlx::query(sql), |query, value| match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => query.bind(integer),
            None => query.bind(number.as_f64()),
        },
        Value::String(text) => query.bind(text.as_str()),
        other => query.bind(other.to_string()),
    })
}

fn row_to_json(row: &SqliteRow) -> Result<JsonRow, sqlx::Error> {
    let mut json_row = Map::new();

    for column in row.columns() {
        let index = column.ordinal();
        let (is_null, type_name) = {
            let raw = row.try_get_raw(index)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };

        let value = if is_null {
            Value::Null
        } else {
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => Number::from_f64(row.try_get_unchecked::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(hex::encode(row.try_get_unchecked::<Vec<u8>, _>(index)?)),
                _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
            }
        };

        json_row.insert(column.name().to_string(), value);
    }

    Ok(json_row)
}
