//! Runs compiled grid queries against `SQLite`
//!
//! One request holds one pooled connection for its three statements. The
//! connection goes back to the pool when the request future completes or is
//! dropped, so a client disconnect or request timeout aborts the in-flight
//! statement and frees the connection without extra bookkeeping.

use std::future::Future;

use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool, TypeInfo, ValueRef};

use crate::compiler::{self, CompiledQuery, QueryCompiler, SqlParam};
use crate::error::{DatabaseError, DatabaseOperation, Result};
use crate::intent::QueryIntent;
use crate::response::DataTablesResponse;

/// Hands out one connection per request
pub trait ConnectionProvider: Send + Sync {
    /// Acquire a connection, released when the guard drops
    fn connection(&self) -> impl Future<Output = Result<PoolConnection<sqlx::Sqlite>>> + Send;
}

impl ConnectionProvider for SqlitePool {
    async fn connection(&self) -> Result<PoolConnection<sqlx::Sqlite>> {
        self.acquire().await.map_err(|e| {
            let err = DatabaseError::from(e);
            // every acquire failure is reported as an acquire failure
            let err = match err.operation {
                DatabaseOperation::Select => err.during(DatabaseOperation::PoolAcquire),
                _ => err,
            };
            err.into()
        })
    }
}

/// Executes a [`QueryIntent`] and assembles the response envelope
#[derive(Debug, Clone)]
pub struct QueryExecutor<P> {
    provider: P,
    compiler: QueryCompiler<compiler::Sqlite>,
}

impl<P: ConnectionProvider> QueryExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            compiler: QueryCompiler::new(compiler::Sqlite),
        }
    }

    /// Acquire a connection and run the intent on it
    pub async fn execute(&self, intent: &QueryIntent) -> Result<DataTablesResponse> {
        let mut conn = self.provider.connection().await?;
        execute_on(&mut conn, &self.compiler, intent).await
    }
}

/// Run total count, filtered count and page select, in that order
///
/// Any failure aborts the whole envelope; no partial result is returned.
pub async fn execute_on(
    conn: &mut SqliteConnection,
    compiler: &QueryCompiler<compiler::Sqlite>,
    intent: &QueryIntent,
) -> Result<DataTablesResponse> {
    let statements = compiler.compile_all(intent);
    let table = intent.table_name();

    let total = fetch_count(conn, &statements.total, table).await?;
    let filtered = fetch_count(conn, &statements.filtered, table).await?;
    let data = fetch_rows(conn, &statements.page, table, intent.columns().len()).await?;

    tracing::debug!(
        table,
        draw = intent.draw(),
        total,
        filtered,
        rows = data.len(),
        "Executed DataTables query"
    );

    DataTablesResponse::new(intent.draw(), total, filtered, data)
}

fn build_query(
    query: &CompiledQuery,
) -> sqlx::query::Query<'_, sqlx::Sqlite, SqliteArguments<'_>> {
    query
        .params
        .iter()
        .fold(sqlx::query(&query.sql), |q, param| match param {
            SqlParam::Text(text) => q.bind(text.as_str()),
            SqlParam::Int(value) => q.bind(*value),
        })
}

/// Attach the statement kind and table to a driver error
fn tag(err: sqlx::Error, operation: DatabaseOperation, table: &str) -> DatabaseError {
    let err = DatabaseError::from(err);
    let err = match err.operation {
        DatabaseOperation::Select => err.during(operation),
        _ => err,
    };
    err.add_context(format!("table={}", table))
}

async fn fetch_count(
    conn: &mut SqliteConnection,
    query: &CompiledQuery,
    table: &str,
) -> Result<i64> {
    tracing::debug!(sql = %query.sql, params = query.params.len(), "Running count");
    let row = build_query(query)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| tag(e, DatabaseOperation::Count, table))?;
    let count = row
        .try_get::<i64, _>(0)
        .map_err(|e| tag(e, DatabaseOperation::Count, table))?;
    Ok(count)
}

async fn fetch_rows(
    conn: &mut SqliteConnection,
    query: &CompiledQuery,
    table: &str,
    width: usize,
) -> Result<Vec<Vec<Value>>> {
    tracing::debug!(sql = %query.sql, params = query.params.len(), "Running page select");
    let rows = build_query(query)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| tag(e, DatabaseOperation::Select, table))?;

    rows.iter()
        .map(|row| {
            decode_row(row, width).map_err(|e| tag(e, DatabaseOperation::Decode, table).into())
        })
        .collect()
}

/// First `width` cells of `row`, typed by their runtime storage class
fn decode_row(row: &SqliteRow, width: usize) -> std::result::Result<Vec<Value>, sqlx::Error> {
    (0..width).map(|index| decode_cell(row, index)).collect()
}

fn decode_cell(row: &SqliteRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match raw.type_info().name() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        // non-finite floats have no JSON form and become null
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(index)?),
        _ => Value::from(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}
