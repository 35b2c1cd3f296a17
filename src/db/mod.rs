//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Session lifecycle (one connection per tool invocation)
//! - Query execution
//! - Schema introspection
//! - Type mappings

pub mod connector;
pub mod executor;
pub mod manager;
pub mod params;
pub mod schema;
pub mod types;

pub use connector::{Connector, DbConnection, SqlxConnector};
pub use executor::QueryExecutor;
pub use manager::{ConnectionGuard, ConnectionManager, ConnectionStats, StatsSnapshot};
pub use schema::SchemaInspector;
