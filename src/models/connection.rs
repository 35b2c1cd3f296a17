//! Connection-related data models.
//!
//! A single [`ConnectionConfig`] is built at startup and shared read-only by
//! every tool invocation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported database backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[value(name = "postgres", alias = "postgresql")]
    PostgreSQL,
    #[value(name = "sqlite")]
    SQLite,
}

impl DatabaseType {
    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Schema used when a tool call does not name one.
    pub fn default_schema(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "public",
            Self::SQLite => "main",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Connection settings for the one configured database.
///
/// For SQLite `database` is the path of the database file and the network
/// fields are ignored.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    /// Contains sensitive data - never log
    pub password: Option<String>,
    pub default_schema: String,
}

impl ConnectionConfig {
    /// PostgreSQL settings with the `public` default schema.
    pub fn postgres(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            db_type: DatabaseType::PostgreSQL,
            host: host.into(),
            port,
            database: database.into(),
            username: Some(username.into()),
            password,
            default_schema: DatabaseType::PostgreSQL.default_schema().to_string(),
        }
    }

    /// SQLite settings for the database file at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            db_type: DatabaseType::SQLite,
            host: String::new(),
            port: 0,
            database: path.into(),
            username: None,
            password: None,
            default_schema: DatabaseType::SQLite.default_schema().to_string(),
        }
    }

    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Human-readable target, safe to log.
    pub fn display_target(&self) -> String {
        match self.db_type {
            DatabaseType::PostgreSQL => format!(
                "postgres://{}@{}:{}/{}",
                self.username.as_deref().unwrap_or(""),
                self.host,
                self.port,
                self.database
            ),
            DatabaseType::SQLite => format!("sqlite:{}", self.database),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("default_schema", &self.default_schema)
            .finish()
    }
}
