//! Configuration handling for the database analyzer gateway.
//!
//! Settings come from CLI arguments with environment-variable fallbacks. They
//! are read once at startup; [`Config::connection_config`] turns them into the
//! immutable [`ConnectionConfig`] shared by every request.

use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{ConnectionConfig, DatabaseType};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_ROWS: u32 = 1000;
/// Upper bound for `--max-rows` and the per-call `max_rows` override.
pub const MAX_ROW_LIMIT: u32 = 10_000;

/// Configuration for the database analyzer gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-analyzer-mcp",
    about = "Read-only MCP gateway - lets AI assistants explore and query a SQL database",
    version,
    author
)]
pub struct Config {
    /// Database backend
    #[arg(long, value_enum, default_value = "postgres", env = "DB_TYPE")]
    pub db_type: DatabaseType,

    /// Database server host
    #[arg(long, default_value = DEFAULT_HOST, env = "POSTGRES_HOST")]
    pub host: String,

    /// Database server port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "POSTGRES_PORT")]
    pub port: u16,

    /// Database name (for SQLite: path to the database file)
    #[arg(long, env = "POSTGRES_DB")]
    pub dbname: Option<String>,

    /// Database user (required for PostgreSQL)
    #[arg(long, env = "POSTGRES_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Schema used when a tool call does not name one
    /// (default: public for PostgreSQL, main for SQLite)
    #[arg(long, env = "POSTGRES_SCHEMA")]
    pub schema: Option<String>,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Maximum number of rows returned by execute_query
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS, env = "MCP_MAX_ROWS")]
    pub max_rows: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            db_type: DatabaseType::PostgreSQL,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dbname: None,
            user: None,
            password: None,
            schema: None,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_rows: DEFAULT_MAX_ROWS,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Build the connection settings, failing on anything required but absent.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        let database = non_empty(self.dbname.as_deref()).ok_or(ConfigError::Missing {
            name: "database name",
            flag: "dbname",
            env: "POSTGRES_DB",
        })?;

        let config = match self.db_type {
            DatabaseType::PostgreSQL => {
                let user = non_empty(self.user.as_deref()).ok_or(ConfigError::Missing {
                    name: "database user",
                    flag: "user",
                    env: "POSTGRES_USER",
                })?;
                if self.host.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        name: "host",
                        reason: "must not be empty".to_string(),
                    });
                }
                ConnectionConfig::postgres(
                    self.host.trim(),
                    self.port,
                    database,
                    user,
                    self.password.clone(),
                )
            }
            DatabaseType::SQLite => ConnectionConfig::sqlite(database),
        };

        Ok(match non_empty(self.schema.as_deref()) {
            Some(schema) => config.with_default_schema(schema),
            None => config,
        })
    }

    /// Validate the numeric limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rows == 0 || self.max_rows > MAX_ROW_LIMIT {
            return Err(ConfigError::Invalid {
                name: "max-rows",
                reason: format!("must be between 1 and {}", MAX_ROW_LIMIT),
            });
        }
        if self.query_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: "query-timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.connect_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: "connect-timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postgres_config() -> Config {
        Config {
            dbname: Some("shop".to_string()),
            user: Some("analyst".to_string()),
            password: Some("secret".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_type, DatabaseType::PostgreSQL);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_rows, DEFAULT_MAX_ROWS);
    }

    #[test]
    fn test_timeout_durations() {
        let config = Config {
            query_timeout: 60,
            connect_timeout: 15,
            ..Config::default()
        };
        assert_eq!(config.query_timeout_duration(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout_duration(), Duration::from_secs(15));
    }

    #[test]
    fn test_connection_config_postgres() {
        let conn = postgres_config().connection_config().unwrap();
        assert_eq!(conn.db_type, DatabaseType::PostgreSQL);
        assert_eq!(conn.host, "localhost");
        assert_eq!(conn.port, 5432);
        assert_eq!(conn.database, "shop");
        assert_eq!(conn.username.as_deref(), Some("analyst"));
        assert_eq!(conn.password.as_deref(), Some("secret"));
        assert_eq!(conn.default_schema, "public");
    }

    #[test]
    fn test_missing_dbname_is_fatal() {
        let config = Config {
            dbname: None,
            ..postgres_config()
        };
        let err = config.connection_config().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { flag: "dbname", .. }));
    }

    #[test]
    fn test_blank_dbname_is_missing() {
        let config = Config {
            dbname: Some("   ".to_string()),
            ..postgres_config()
        };
        assert!(config.connection_config().is_err());
    }

    #[test]
    fn test_missing_user_is_fatal_for_postgres() {
        let config = Config {
            user: None,
            ..postgres_config()
        };
        let err = config.connection_config().unwrap_err();
        assert!(matches!(err, ConfigError::Missing { env: "POSTGRES_USER", .. }));
    }

    #[test]
    fn test_sqlite_needs_no_user() {
        let config = Config {
            db_type: DatabaseType::SQLite,
            dbname: Some("/tmp/app.db".to_string()),
            ..Config::default()
        };
        let conn = config.connection_config().unwrap();
        assert_eq!(conn.db_type, DatabaseType::SQLite);
        assert_eq!(conn.database, "/tmp/app.db");
        assert_eq!(conn.default_schema, "main");
    }

    #[test]
    fn test_schema_override() {
        let config = Config {
            schema: Some("analytics".to_string()),
            ..postgres_config()
        };
        assert_eq!(
            config.connection_config().unwrap().default_schema,
            "analytics"
        );
    }

    #[test]
    fn test_validate_limits() {
        assert!(Config::default().validate().is_ok());
        let zero_rows = Config {
            max_rows: 0,
            ..Config::default()
        };
        assert!(zero_rows.validate().is_err());
        let too_many = Config {
            max_rows: MAX_ROW_LIMIT + 1,
            ..Config::default()
        };
        assert!(too_many.validate().is_err());
        let no_timeout = Config {
            query_timeout: 0,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::try_parse_from([
            "db-analyzer-mcp",
            "--db-type",
            "sqlite",
            "--dbname",
            "./local.db",
            "--max-rows",
            "50",
        ])
        .unwrap();
        assert_eq!(config.db_type, DatabaseType::SQLite);
        assert_eq!(config.dbname.as_deref(), Some("./local.db"));
        assert_eq!(config.max_rows, 50);
    }
}
