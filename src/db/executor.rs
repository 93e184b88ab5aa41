//! Query execution engine.
//!
//! Row limits are enforced while streaming, so only `limit + 1` rows are ever
//! pulled from the server. Every fetch runs under a timeout.
//!
//! Each backend module below provides the same interface adapted to its
//! driver; the structure is kept parallel to make differences obvious.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DashboardError, DbResult};
use crate::models::{ColumnMetadata, QueryOptions, QueryResult};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
pub struct QueryExecutor {
    default_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Run a SQL statement and collect at most `options.effective_limit()` rows.
    ///
    /// No read-only check happens here; callers validate first.
    pub async fn fetch(
        &self,
        pool: &DbPool,
        sql: &str,
        options: &QueryOptions,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        let row_limit = options.effective_limit();
        let query_timeout = match options.timeout_secs {
            Some(_) => Duration::from_secs(options.effective_timeout() as u64),
            None => self.default_timeout,
        };

        debug!(
            sql = %sql,
            limit = row_limit,
            timeout_secs = query_timeout.as_secs(),
            "Executing query"
        );

        match pool {
            DbPool::MySql(p) => {
                let rows = mysql::fetch_rows(p, sql, row_limit, query_timeout).await?;
                Ok(process_rows(rows, row_limit, start))
            }
            DbPool::SQLite(p) => {
                let rows = sqlite::fetch_rows(p, sql, row_limit, query_timeout).await?;
                Ok(process_rows(rows, row_limit, start))
            }
        }
    }
}

/// Convert fetched rows into a positional result, trimming the look-ahead row.
fn process_rows<R: RowToJson>(rows: Vec<R>, row_limit: u32, start: Instant) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    let Some(first) = rows.first() else {
        return QueryResult::empty(Vec::<ColumnMetadata>::new(), execution_time_ms);
    };

    let columns = first.column_metadata();
    let total_rows = rows.len();
    let truncated = total_rows > row_limit as usize;

    let json_rows: Vec<Vec<serde_json::Value>> = rows
        .iter()
        .take(row_limit as usize)
        .map(|r| r.to_json_values())
        .collect();

    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    QueryResult {
        columns,
        rows: json_rows,
        truncated,
        execution_time_ms,
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    results
        .into_iter()
        .map(|r| r.map_err(DashboardError::from))
        .collect()
}

fn timeout_error(operation: &str, timeout: Duration) -> DashboardError {
    DashboardError::timeout(operation, timeout.as_secs() as u32)
}

fn fetch_limit(row_limit: u32) -> usize {
    (row_limit as usize).saturating_add(1)
}

mod mysql {
    use super::*;
    use sqlx::Executor;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>> {
        // Raw SQL avoids prepared statements; SHOW and friends don't support them
        let rows_future = pool
            .fetch(sql)
            .take(fetch_limit(row_limit))
            .collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::Executor;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>> {
        let rows_future = pool
            .fetch(sql)
            .take(fetch_limit(row_limit))
            .collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}
