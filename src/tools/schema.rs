//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `get_table_schema` and
//! `get_table_relationships` MCP tools.

use crate::db::{ConnectionManager, Connector, DbConnection, SchemaInspector, SqlxConnector};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDescriptor, RelationshipDescriptor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Schema to inspect. Defaults to the server's configured schema.
    #[serde(default)]
    pub schema: Option<String>,
    /// Include views in the result. Default: true
    #[serde(default = "default_true")]
    pub include_views: bool,
}

fn default_true() -> bool {
    true
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub schema: String,
    /// Table names, ordered by name
    pub tables: Vec<String>,
    pub count: usize,
}

/// Input for the get_table_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTableSchemaInput {
    /// Table name (unquoted, case-sensitive)
    pub table: String,
    /// Schema containing the table. Defaults to the server's configured schema.
    #[serde(default)]
    pub schema: Option<String>,
}

/// Output from the get_table_schema tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GetTableSchemaOutput {
    pub schema: String,
    pub table: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnDescriptor>,
    pub count: usize,
}

/// Input for the get_table_relationships tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetTableRelationshipsInput {
    /// Schema to inspect. Defaults to the server's configured schema.
    #[serde(default)]
    pub schema: Option<String>,
    /// Only return foreign keys declared on this table
    #[serde(default)]
    pub table: Option<String>,
}

/// Output from the get_table_relationships tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GetTableRelationshipsOutput {
    pub schema: String,
    /// The table filter, if one was given
    pub table: Option<String>,
    /// Foreign-key column pairs ordered by source table, constraint and key position
    pub relationships: Vec<RelationshipDescriptor>,
    pub count: usize,
}

/// Handler for schema tools.
pub struct SchemaToolHandler<C: Connector<Connection = DbConnection> = SqlxConnector> {
    connection_manager: Arc<ConnectionManager<C>>,
    default_schema: String,
}

impl<C: Connector<Connection = DbConnection>> SchemaToolHandler<C> {
    pub fn new(connection_manager: Arc<ConnectionManager<C>>, default_schema: impl Into<String>) -> Self {
        Self {
            connection_manager,
            default_schema: default_schema.into(),
        }
    }

    fn resolve_schema(&self, schema: Option<String>) -> String {
        schema.unwrap_or_else(|| self.default_schema.clone())
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let request_id = Uuid::new_v4();
        let schema = self.resolve_schema(input.schema);

        let mut guard = self.connection_manager.acquire().await?;
        let result =
            SchemaInspector::list_tables(guard.connection(), &schema, input.include_views).await;
        guard.release().await;

        let tables = result?;
        let count = tables.len();

        info!(
            request_id = %request_id,
            schema = %schema,
            count = count,
            "Listed tables"
        );

        Ok(ListTablesOutput {
            schema,
            tables,
            count,
        })
    }

    pub async fn get_table_schema(&self, input: GetTableSchemaInput) -> DbResult<GetTableSchemaOutput> {
        let request_id = Uuid::new_v4();
        let table = input.table.trim().to_string();
        if table.is_empty() {
            return Err(DbError::invalid_input("'table' must not be empty"));
        }
        let schema = self.resolve_schema(input.schema);

        let mut guard = self.connection_manager.acquire().await?;
        let result = SchemaInspector::describe_table(guard.connection(), &schema, &table).await;
        guard.release().await;

        let descriptor = result?;
        let count = descriptor.columns.len();

        info!(
            request_id = %request_id,
            schema = %descriptor.schema,
            table = %descriptor.table,
            columns = count,
            "Described table"
        );

        Ok(GetTableSchemaOutput {
            schema: descriptor.schema,
            table: descriptor.table,
            columns: descriptor.columns,
            count,
        })
    }

    pub async fn get_table_relationships(
        &self,
        input: GetTableRelationshipsInput,
    ) -> DbResult<GetTableRelationshipsOutput> {
        let request_id = Uuid::new_v4();
        let schema = self.resolve_schema(input.schema);
        let table = input
            .table
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mut guard = self.connection_manager.acquire().await?;
        let result =
            SchemaInspector::list_relationships(guard.connection(), &schema, table.as_deref())
                .await;
        guard.release().await;

        let relationships = result?;
        let count = relationships.len();

        info!(
            request_id = %request_id,
            schema = %schema,
            table = ?table,
            count = count,
            "Listed relationships"
        );

        Ok(GetTableRelationshipsOutput {
            schema,
            table,
            relationships,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tables_input_defaults() {
        let input: ListTablesInput = serde_json::from_str("{}").unwrap();
        assert!(input.schema.is_none());
        assert!(input.include_views);
    }

    #[test]
    fn test_get_table_schema_input_requires_table() {
        assert!(serde_json::from_str::<GetTableSchemaInput>("{}").is_err());
        let input: GetTableSchemaInput =
            serde_json::from_str(r#"{"table": "orders", "schema": "sales"}"#).unwrap();
        assert_eq!(input.table, "orders");
        assert_eq!(input.schema.as_deref(), Some("sales"));
    }

    #[test]
    fn test_relationships_output_shape() {
        let output = GetTableRelationshipsOutput {
            schema: "public".into(),
            table: None,
            relationships: vec![RelationshipDescriptor {
                constraint_name: "orders_customer_id_fkey".into(),
                source_table: "orders".into(),
                source_column: "customer_id".into(),
                target_table: "customers".into(),
                target_column: "id".into(),
            }],
            count: 1,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["relationships"][0]["target_table"], "customers");
        assert!(json["table"].is_null());
        assert_eq!(json["count"], 1);
    }
}
