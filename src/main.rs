//! Database Analyzer MCP Server - Main entry point.
//!
//! Serves read-only schema exploration and SELECT execution against one
//! configured PostgreSQL or SQLite database over MCP stdio.

use db_analyzer_mcp::config::Config;
use db_analyzer_mcp::db::{ConnectionManager, QueryExecutor, SqlxConnector};
use db_analyzer_mcp::mcp::GatewayService;
use db_analyzer_mcp::transport::{StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the MCP protocol.
fn init_tracing(config: &Config) {
    if !config.enable_logs {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    let connection_config = match config.validate().and_then(|_| config.connection_config()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: db-analyzer-mcp --dbname <name> --user <user> [--password <password>]");
            eprintln!("       db-analyzer-mcp --db-type sqlite --dbname <path>");
            eprintln!();
            eprintln!("Every flag can also be set through its environment variable, e.g.");
            eprintln!("  POSTGRES_HOST=db POSTGRES_DB=shop POSTGRES_USER=reader db-analyzer-mcp");
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_tracing(&config);

    info!(
        database = %connection_config.display_target(),
        schema = %connection_config.default_schema,
        max_rows = config.max_rows,
        query_timeout_secs = config.query_timeout,
        "Starting Database Analyzer MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let default_schema = connection_config.default_schema.clone();
    let connector = SqlxConnector::new(
        connection_config,
        config.connect_timeout_duration(),
        config.query_timeout_duration(),
    );
    let connection_manager = Arc::new(ConnectionManager::new(connector));
    let executor = QueryExecutor::new(config.query_timeout_duration(), config.max_rows);
    let service = GatewayService::new(connection_manager.clone(), executor, default_schema);

    let transport = StdioTransport::new(service, connection_manager);
    info!(transport = transport.name(), "Using stdio transport");

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
