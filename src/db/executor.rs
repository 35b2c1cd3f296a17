//! Query execution engine.
//!
//! This module provides query execution functionality with support for:
//! - Parameterized queries
//! - Row caps (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//!
//! Every statement passes the SQL safety validator before it reaches the
//! database.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules
//! (`postgres`, `sqlite`). Each prepares the statement first so column
//! metadata is known even when no rows come back. On PostgreSQL the statement
//! is prepared with the types of the bound values, so the server never infers
//! a parameter type the encoded value does not match.

use crate::config::{DEFAULT_MAX_ROWS, DEFAULT_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT};
use crate::db::connector::DbConnection;
use crate::db::params::{bind_postgres_param, bind_sqlite_param, postgres_param_types};
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnMetadata, QueryParam, QueryRequest, QueryResult};
use crate::tools::sql_validator;
use futures_util::StreamExt;
use sqlx::{Column, Executor, Statement, TypeInfo};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    default_timeout: Duration,
    default_max_rows: u32,
}

impl QueryExecutor {
    /// Create a new query executor with custom settings.
    pub fn new(default_timeout: Duration, default_max_rows: u32) -> Self {
        Self {
            default_timeout,
            default_max_rows: default_max_rows.clamp(1, MAX_ROW_LIMIT),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Row cap for a request: the requested value clamped to
    /// `[1, MAX_ROW_LIMIT]`, or the executor default.
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .map(|l| l.clamp(1, MAX_ROW_LIMIT))
            .unwrap_or(self.default_max_rows)
    }

    /// Validate and run a read-only query.
    ///
    /// Rejected statements never reach the connection.
    pub async fn execute(
        &self,
        conn: &mut DbConnection,
        request: &QueryRequest,
    ) -> DbResult<QueryResult> {
        sql_validator::ensure_safe(&request.sql)?;

        let start = Instant::now();
        let row_limit = self.effective_limit(request.max_rows);

        // Parameter values are not logged
        debug!(
            sql = %request.sql,
            params = request.params.len(),
            limit = row_limit,
            timeout_secs = self.default_timeout.as_secs(),
            "Executing query"
        );

        let result = match conn {
            DbConnection::Postgres(c) => {
                let fetched =
                    postgres::fetch(c, &request.sql, &request.params, row_limit, self.default_timeout)
                        .await?;
                process_rows(fetched, row_limit, start)
            }
            DbConnection::Sqlite(c) => {
                let fetched =
                    sqlite::fetch(c, &request.sql, &request.params, row_limit, self.default_timeout)
                        .await?;
                process_rows(fetched, row_limit, start)
            }
        };

        Ok(result)
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            DEFAULT_MAX_ROWS,
        )
    }
}

/// Rows fetched from the driver, up to one past the cap.
struct Fetched<R> {
    columns: Vec<ColumnMetadata>,
    rows: Vec<R>,
}

/// Turn fetched rows into a QueryResult, cutting at the cap.
fn process_rows<R: RowToRecord>(fetched: Fetched<R>, row_limit: u32, start: Instant) -> QueryResult {
    let Fetched { columns, rows } = fetched;
    let total_rows = rows.len();
    let truncated = total_rows > row_limit as usize;

    let records = rows
        .iter()
        .take(row_limit as usize)
        .map(RowToRecord::to_record)
        .collect();

    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    QueryResult {
        columns,
        rows: records,
        truncated,
        execution_time_ms: start.elapsed().as_millis() as u64,
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

fn timeout_error(query_timeout: Duration) -> DbError {
    DbError::timeout("query execution", query_timeout.as_secs())
}

fn statement_columns<C: Column>(columns: &[C]) -> Vec<ColumnMetadata> {
    columns
        .iter()
        .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
        .collect()
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod postgres {
    use super::*;
    use sqlx::postgres::{PgConnection, PgRow};

    pub async fn fetch(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
        row_limit: u32,
        query_timeout: Duration,
    ) -> DbResult<Fetched<PgRow>> {
        let fetch_limit = row_limit as usize + 1;
        let param_types = postgres_param_types(params);
        let work = async {
            let statement = (&mut *conn).prepare_with(sql, &param_types).await?;
            let columns = statement_columns(statement.columns());

            let mut query = statement.query();
            for param in params {
                query = bind_postgres_param(query, param);
            }
            let results = query
                .fetch(&mut *conn)
                .take(fetch_limit)
                .collect::<Vec<_>>()
                .await;
            Ok::<_, DbError>(Fetched {
                columns,
                rows: collect_rows(results)?,
            })
        };

        match timeout(query_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::sqlite::{SqliteConnection, SqliteRow};

    pub async fn fetch(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
        row_limit: u32,
        query_timeout: Duration,
    ) -> DbResult<Fetched<SqliteRow>> {
        let fetch_limit = row_limit as usize + 1;
        let work = async {
            let statement = (&mut *conn).prepare(sql).await?;
            let columns = statement_columns(statement.columns());

            let mut query = statement.query();
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let results = query
                .fetch(&mut *conn)
                .take(fetch_limit)
                .collect::<Vec<_>>()
                .await;
            Ok::<_, DbError>(Fetched {
                columns,
                rows: collect_rows(results)?,
            })
        };

        match timeout(query_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}
