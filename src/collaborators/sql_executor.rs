//! SQL executor collaborator — `execute(sql, params?) -> {success, columns,
//! rows, row_count, error?}` (§6.4). Read-only; opens and closes one
//! connection per call, no pooling at this layer beyond what sqlx's pool
//! already provides underneath.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Column, PgPool, Row};

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub error: Option<String>,
}

impl ExecutionResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// `sql` uses `?` placeholders; `params` are positional bind values in
    /// the same order. Never raises — failures are reported in the result.
    async fn execute(&self, sql: &str, params: &[Value]) -> ExecutionResult;
}

/// Rewrites `?` placeholders into Postgres's `$1, $2, ...` form. Only the
/// executor needs to know about this — every other stage works in terms
/// of the dialect-neutral `?` form from [`crate::utils::substitution`].
fn to_postgres_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut n = 0u32;
    let mut in_string = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => {
                n += 1;
                out.push_str(&format!("${n}"));
            }
            _ => out.push(ch),
        }
    }
    out
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    let mut json_row = serde_json::Map::new();
    for column in row.columns() {
        let value = if let Ok(v) = row.try_get::<String, _>(column.ordinal()) {
            Value::String(v)
        } else if let Ok(v) = row.try_get::<i32, _>(column.ordinal()) {
            Value::Number(v.into())
        } else if let Ok(v) = row.try_get::<i64, _>(column.ordinal()) {
            Value::Number(v.into())
        } else if let Ok(v) = row.try_get::<f64, _>(column.ordinal()) {
            serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<bool, _>(column.ordinal()) {
            Value::Bool(v)
        } else if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(column.ordinal()) {
            Value::String(v.to_string())
        } else {
            Value::Null
        };
        json_row.insert(column.name().to_string(), value);
    }
    Value::Object(json_row)
}

pub struct PostgresSqlExecutor {
    pool: PgPool,
}

impl PostgresSqlExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for PostgresSqlExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> ExecutionResult {
        let translated = to_postgres_placeholders(sql);
        let mut query = sqlx::query(&translated);
        for param in params {
            query = bind_value(query, param);
        }

        match query.fetch_all(&self.pool).await {
            Ok(rows) => {
                let columns = rows
                    .first()
                    .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
                    .unwrap_or_default();
                let row_count = rows.len();
                let json_rows = rows.iter().map(row_to_json).collect();
                ExecutionResult {
                    success: true,
                    columns,
                    rows: json_rows,
                    row_count,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "sql execution failed");
                ExecutionResult::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_placeholders_skipping_quoted_question_marks() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?";
        assert_eq!(to_postgres_placeholders(sql), "SELECT * FROM t WHERE a = $1 AND b = '?' AND c = $2");
    }
}
