//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct with the four database
//! tools exposed via the MCP protocol using the rmcp framework's macros.

use crate::db::{ConnectionManager, QueryExecutor};
use crate::tools::query::{ExecuteQueryInput, ExecuteQueryOutput, QueryToolHandler};
use crate::tools::schema::{
    GetTableRelationshipsInput, GetTableRelationshipsOutput, GetTableSchemaInput,
    GetTableSchemaOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayService {
    schema_handler: Arc<SchemaToolHandler>,
    query_handler: Arc<QueryToolHandler>,
    default_schema: String,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    /// Create a new GatewayService.
    ///
    /// # Arguments
    ///
    /// * `connection_manager` - Opens one session per tool invocation
    /// * `executor` - Query executor carrying the timeout and row cap
    /// * `default_schema` - Schema used when a tool call omits one
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        executor: QueryExecutor,
        default_schema: impl Into<String>,
    ) -> Self {
        let default_schema = default_schema.into();
        Self {
            schema_handler: Arc::new(SchemaToolHandler::new(
                connection_manager.clone(),
                default_schema.clone(),
            )),
            query_handler: Arc::new(QueryToolHandler::new(connection_manager, executor)),
            default_schema,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "List the tables in a schema, ordered by name.\nOmit `schema` to use the server's default schema. Views are included unless include_views is false."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema_handler
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Describe a table's columns in ordinal order: name, type, nullability, default and key role (primary, foreign, unique)."
    )]
    async fn get_table_schema(
        &self,
        Parameters(input): Parameters<GetTableSchemaInput>,
    ) -> Result<Json<GetTableSchemaOutput>, McpError> {
        self.schema_handler
            .get_table_schema(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List foreign-key relationships in a schema, one entry per column pair.\nPass `table` to only see the foreign keys declared on that table."
    )]
    async fn get_table_relationships(
        &self,
        Parameters(input): Parameters<GetTableRelationshipsInput>,
    ) -> Result<Json<GetTableRelationshipsOutput>, McpError> {
        self.schema_handler
            .get_table_relationships(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Execute a single read-only SELECT statement and return rows.\nPass values through `params` ($1, $2... on PostgreSQL, ?1, ?2... on SQLite), never inline them.\nStatements containing INSERT, UPDATE, DELETE, DROP, ALTER, TRUNCATE, CREATE, GRANT, REVOKE, INTO, MERGE, COPY, CALL or EXECUTE anywhere, or more than one statement, are rejected."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<Json<ExecuteQueryOutput>, McpError> {
        self.query_handler
            .execute_query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                title: Some("Database Analyzer MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Read-only access to one configured database.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` to see what exists\n\
                2. Call `get_table_schema` and `get_table_relationships` to learn columns and joins\n\
                3. Call `execute_query` with a single SELECT, passing values through `params`\n\
                \n\
                ## Notes\n\
                - The default schema is `{}`\n\
                - Results are capped (default 1000 rows); `truncated` is true when more rows exist\n\
                - On PostgreSQL string parameters are sent as text: cast them in SQL (`$1::date`)",
                self.default_schema
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqlxConnector;
    use crate::models::ConnectionConfig;
    use std::time::Duration;

    fn create_test_service() -> GatewayService {
        let connector = SqlxConnector::new(
            ConnectionConfig::sqlite("unused.db"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let manager = Arc::new(ConnectionManager::new(connector));
        GatewayService::new(manager, QueryExecutor::default(), "main")
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, env!("CARGO_PKG_NAME"));
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("`main`"));
    }

    #[test]
    fn test_exposes_exactly_four_tools() {
        let service = create_test_service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "execute_query",
                "get_table_relationships",
                "get_table_schema",
                "list_tables"
            ]
        );
    }
}
