//! MCP tool implementations.
//!
//! This module contains all database tool handlers:
//! - `query`: Execute SELECT queries (`execute_query`)
//! - `schema`: `list_tables`, `get_table_schema`, `get_table_relationships`
//! - `sql_validator`: SQL statement validation for read-only enforcement

pub mod query;
pub mod schema;
pub mod sql_validator;

pub use query::{ExecuteQueryInput, ExecuteQueryOutput, QueryToolHandler};
pub use schema::{
    GetTableRelationshipsInput, GetTableRelationshipsOutput, GetTableSchemaInput,
    GetTableSchemaOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
