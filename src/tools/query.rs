//! Query execution tool.
//!
//! This module implements the `execute_query` MCP tool for running SELECT
//! queries. Anything the SQL safety validator does not accept is rejected
//! before a connection is opened.

use crate::db::{ConnectionManager, Connector, DbConnection, QueryExecutor, SqlxConnector};
use crate::error::DbResult;
use crate::models::{ColumnMetadata, QueryParam, QueryRequest};
use crate::tools::sql_validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// A single SELECT statement. Use $1, $2... (PostgreSQL) or ?1, ?2... (SQLite) placeholders for values.
    pub query: String,
    /// Positional parameter values, bound in order
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default)]
    pub max_rows: Option<u32>,
}

/// Output from the execute_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteQueryOutput {
    /// Result columns in select-list order
    pub columns: Vec<ColumnMetadata>,
    /// Rows as column-name to value maps, in result-set column order
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    /// True if more rows were available than max_rows
    pub truncated: bool,
    pub execution_time_ms: u64,
}

/// Handler for query operations.
pub struct QueryToolHandler<C: Connector<Connection = DbConnection> = SqlxConnector> {
    connection_manager: Arc<ConnectionManager<C>>,
    executor: QueryExecutor,
}

impl<C: Connector<Connection = DbConnection>> QueryToolHandler<C> {
    pub fn new(connection_manager: Arc<ConnectionManager<C>>, executor: QueryExecutor) -> Self {
        Self {
            connection_manager,
            executor,
        }
    }

    pub async fn execute_query(&self, input: ExecuteQueryInput) -> DbResult<ExecuteQueryOutput> {
        let request_id = Uuid::new_v4();

        // Gate before any connection is opened
        sql_validator::ensure_safe(&input.query)?;

        let request = QueryRequest::new(input.query).with_params(input.params);
        let request = match input.max_rows {
            Some(max_rows) => request.with_max_rows(max_rows),
            None => request,
        };

        let mut guard = self.connection_manager.acquire().await?;
        let result = self.executor.execute(guard.connection(), &request).await;
        guard.release().await;

        let result = result?;
        let row_count = result.row_count();

        info!(
            request_id = %request_id,
            row_count = row_count,
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(ExecuteQueryOutput {
            columns: result.columns,
            rows: result.rows.into_iter().map(|r| r.into_json()).collect(),
            row_count,
            truncated: result.truncated,
            execution_time_ms: result.execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults() {
        let input: ExecuteQueryInput = serde_json::from_str(r#"{"query": "SELECT 1"}"#).unwrap();
        assert!(input.params.is_empty());
        assert!(input.max_rows.is_none());
    }

    #[test]
    fn test_input_with_params() {
        let input: ExecuteQueryInput = serde_json::from_str(
            r#"{"query": "SELECT * FROM accounts WHERE id = $1", "params": [42], "max_rows": 10}"#,
        )
        .unwrap();
        assert_eq!(input.params, vec![QueryParam::Int(42)]);
        assert_eq!(input.max_rows, Some(10));
    }

    #[test]
    fn test_output_keeps_column_order() {
        let mut row = serde_json::Map::new();
        row.insert("zeta".into(), JsonValue::from(1));
        row.insert("alpha".into(), JsonValue::from(2));
        let output = ExecuteQueryOutput {
            columns: vec![ColumnMetadata::new("zeta", "INT4"), ColumnMetadata::new("alpha", "INT4")],
            rows: vec![row],
            row_count: 1,
            truncated: false,
            execution_time_ms: 3,
        };
        let text = serde_json::to_string(&output).unwrap();
        assert!(text.find("\"zeta\":1").unwrap() < text.find("\"alpha\":2").unwrap());
    }
}
