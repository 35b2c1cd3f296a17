//! Data models for the database analyzer gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DatabaseType};
pub use query::{ColumnMetadata, QueryParam, QueryRequest, QueryResult};
pub use schema::{ColumnDescriptor, KeyRole, RelationshipDescriptor, TableDescriptor};
pub use value::{Record, SqlValue};
