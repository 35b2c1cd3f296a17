//! Database Analyzer MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools that let AI
//! assistants explore a PostgreSQL or SQLite schema and run read-only
//! SELECT queries without holding credentials themselves.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::GatewayService;
