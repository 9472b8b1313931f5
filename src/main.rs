//! db-facade - Main entry point.
//!
//! Runs one SQL statement through the single-connection database facade and prints
//! the fetched rows as JSON.

use clap::Parser;
use db_facade::config::{Config, FetchMode};
use db_facade::db::SqlxAdapter;
use db_facade::logging::{
    FileLogger, FileLoggerSettings, LoggerConfig, LoggerObserver, LoggerSubject, TracingObserver,
};
use db_facade::os::LocalFileExplorer;
use db_facade::{Database, QueryInterface, SingleConnectionDatabase};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries the query result
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run(config: &Config) -> Result<JsonValue, Box<dyn std::error::Error>> {
    config.validate()?;
    let connection_config = config.connection_config()?;
    let params = config.query_params();

    let adapter = SqlxAdapter::new()?;
    let mut database =
        SingleConnectionDatabase::open(Box::new(adapter), connection_config, &config.placeholder)?;

    database.register_logger_observer(Arc::new(TracingObserver));
    if let Some(path) = &config.log_file {
        let logger: Arc<dyn LoggerObserver> = Arc::new(FileLogger::with_parts(
            LoggerConfig::File(FileLoggerSettings::new(path)),
            Box::new(LocalFileExplorer),
        ));
        database.register_logger_observer(logger);
    }

    let output = if config.transaction {
        if let Some(level) = config.isolation_level()? {
            database.apply_isolation_level(level)?;
        }
        database.begin_transaction()?;
        let rows = database.execute_in_transaction(&config.query, &params)?;
        database.commit_transaction()?;
        json!({ "rows": rows, "committed": true })
    } else {
        match config.fetch {
            FetchMode::None => {
                let affected = database.execute_query_no_returns(&config.query, &params)?;
                json!({ "rows_affected": affected })
            }
            FetchMode::One => {
                let row = database.execute_query_returns_one(&config.query, &params)?;
                json!({ "row": row })
            }
            FetchMode::Many => {
                let rows =
                    database.execute_query_returns_many(&config.query, &params, config.count)?;
                json!({ "rows": rows })
            }
            FetchMode::All => {
                let rows = database.execute_query_returns_all(&config.query, &params)?;
                json!({ "rows": rows })
            }
        }
    };

    database.deconstruct_database_and_components()?;
    Ok(output)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        fetch = %config.fetch,
        transaction = config.transaction,
        "Starting db-facade v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run(&config) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Statement failed");
            Err(e)
        }
    }
}
