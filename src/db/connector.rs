//! Opening and closing database sessions.
//!
//! [`Connector`] is the seam between the connection lifecycle and the driver:
//! [`SqlxConnector`] opens real PostgreSQL or SQLite sessions, and tests can
//! substitute their own implementation.

use std::future::Future;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType};

/// Opens and closes one kind of session.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new session.
    fn connect(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    /// Close a session. Errors are logged, never returned: the handle is gone
    /// either way.
    fn close(&self, conn: Self::Connection) -> impl Future<Output = ()> + Send;
}

/// A live session to the configured database.
#[derive(Debug)]
pub enum DbConnection {
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

impl DbConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            Self::Postgres(_) => DatabaseType::PostgreSQL,
            Self::Sqlite(_) => DatabaseType::SQLite,
        }
    }
}

/// Connector backed by sqlx single connections.
///
/// PostgreSQL sessions are opened read-only with a server-side
/// `statement_timeout`; SQLite files are opened read-only.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    config: ConnectionConfig,
    connect_timeout: Duration,
    statement_timeout: Duration,
}

impl SqlxConnector {
    pub fn new(
        config: ConnectionConfig,
        connect_timeout: Duration,
        statement_timeout: Duration,
    ) -> Self {
        Self {
            config,
            connect_timeout,
            statement_timeout,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn open(&self) -> Result<DbConnection, sqlx::Error> {
        match self.config.db_type {
            DatabaseType::PostgreSQL => {
                let statement_timeout_ms = self.statement_timeout.as_millis().to_string();
                let mut options = PgConnectOptions::new()
                    .host(&self.config.host)
                    .port(self.config.port)
                    .database(&self.config.database)
                    .application_name(env!("CARGO_PKG_NAME"))
                    .options([
                        ("default_transaction_read_only", "on"),
                        ("statement_timeout", statement_timeout_ms.as_str()),
                    ]);
                if let Some(user) = &self.config.username {
                    options = options.username(user);
                }
                if let Some(password) = &self.config.password {
                    options = options.password(password);
                }
                Ok(DbConnection::Postgres(options.connect().await?))
            }
            DatabaseType::SQLite => {
                let options = SqliteConnectOptions::new()
                    .filename(&self.config.database)
                    .read_only(true)
                    .create_if_missing(false);
                Ok(DbConnection::Sqlite(options.connect().await?))
            }
        }
    }
}

impl Connector for SqlxConnector {
    type Connection = DbConnection;

    async fn connect(&self) -> DbResult<DbConnection> {
        let db_type = self.config.db_type;
        debug!(target = %self.config.display_target(), "Opening database session");

        match timeout(self.connect_timeout, self.open()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(DbError::connection(
                format!("Failed to connect: {}", e),
                connection_suggestion(db_type, &e),
            )),
            Err(_) => Err(DbError::timeout(
                "connect",
                self.connect_timeout.as_secs(),
            )),
        }
    }

    async fn close(&self, conn: DbConnection) {
        let result = match conn {
            DbConnection::Postgres(c) => c.close().await,
            DbConnection::Sqlite(c) => c.close().await,
        };
        if let Err(e) = result {
            debug!(error = %e, "Database session closed with error");
        }
    }
}

/// Hint for a failed connection attempt, derived from the driver error.
pub fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify POSTGRES_USER and POSTGRES_PASSWORD".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unable to open") {
        return "Check that the database named by POSTGRES_DB exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    match db_type {
        DatabaseType::PostgreSQL => {
            "Verify POSTGRES_HOST and POSTGRES_PORT point at a reachable server".to_string()
        }
        DatabaseType::SQLite => {
            "Verify the database file path exists and is readable".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_for_refused_connection() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused (os error 111)",
        ));
        let hint = connection_suggestion(DatabaseType::PostgreSQL, &err);
        assert!(hint.contains("PostgreSQL server is running"));
    }

    #[test]
    fn test_suggestion_for_missing_database() {
        let err = sqlx::Error::Protocol("database \"shop\" does not exist".to_string());
        let hint = connection_suggestion(DatabaseType::PostgreSQL, &err);
        assert!(hint.contains("POSTGRES_DB"));
    }

    #[test]
    fn test_suggestion_fallback_per_backend() {
        let err = sqlx::Error::Protocol("something odd".to_string());
        assert!(connection_suggestion(DatabaseType::SQLite, &err).contains("file path"));
        assert!(connection_suggestion(DatabaseType::PostgreSQL, &err).contains("POSTGRES_HOST"));
    }

    #[tokio::test]
    async fn test_missing_sqlite_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let connector = SqlxConnector::new(
            ConnectionConfig::sqlite(path.to_string_lossy()),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }), "{:?}", err);
    }
}
