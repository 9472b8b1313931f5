//! Configuration handling for the db-facade binary.
//!
//! CLI arguments and environment variables are parsed with clap. The defaults here
//! are shared with the library (placeholder, adapter timeouts).

use crate::db::transaction::IsolationLevel;
use crate::error::{DbError, DbResult};
use crate::models::connection::{KEY_CONNECT_TIMEOUT, KEY_QUERY_TIMEOUT};
use crate::models::{ConnectionConfig, QueryParam};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUERY_PLACEHOLDER: &str = "?";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How many rows the binary fetches after executing its statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FetchMode {
    /// Execute only
    None,
    /// First row
    One,
    /// Up to `--count` rows
    Many,
    /// Every row
    #[default]
    All,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::One => write!(f, "one"),
            Self::Many => write!(f, "many"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Configuration for the db-facade binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-facade",
    about = "Run a SQL statement through the single-connection database facade",
    version,
    author
)]
pub struct Config {
    /// Database connection URL (mysql://, postgres://, sqlite:)
    #[arg(short = 'd', long = "database", value_name = "URL", env = "DATABASE_URL")]
    pub database: String,

    /// SQL statement to execute
    #[arg(short, long)]
    pub query: String,

    /// Statement parameter as a JSON literal; bare text is taken as a string.
    /// Can be specified multiple times, in placeholder order.
    #[arg(short, long = "param", value_name = "JSON")]
    pub params: Vec<String>,

    /// Token marking parameter positions in the statement
    #[arg(long, default_value = DEFAULT_QUERY_PLACEHOLDER, env = "DB_FACADE_PLACEHOLDER")]
    pub placeholder: String,

    /// Rows to fetch after execution
    #[arg(long, value_enum, default_value = "all")]
    pub fetch: FetchMode,

    /// Row count for `--fetch many`
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "DB_FACADE_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "DB_FACADE_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Isolation level for `--transaction` (read_uncommitted, read_committed,
    /// repeatable_read, serializable)
    #[arg(long, value_name = "LEVEL")]
    pub isolation_level: Option<String>,

    /// Run the statement inside a transaction and commit it
    #[arg(long)]
    pub transaction: bool,

    /// Append facade log entries to this file
    #[arg(long, value_name = "PATH", env = "DB_FACADE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DB_FACADE_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_FACADE_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Connection parameters from the URL plus the timeout flags.
    ///
    /// Timeouts given as URL query parameters take precedence.
    pub fn connection_config(&self) -> DbResult<ConnectionConfig> {
        let mut config = ConnectionConfig::from_url(&self.database)?;
        if config.get(KEY_CONNECT_TIMEOUT).is_none() {
            config.insert(KEY_CONNECT_TIMEOUT, self.connect_timeout.to_string());
        }
        if config.get(KEY_QUERY_TIMEOUT).is_none() {
            config.insert(KEY_QUERY_TIMEOUT, self.query_timeout.to_string());
        }
        Ok(config)
    }

    /// Statement parameters in the order given.
    pub fn query_params(&self) -> Vec<QueryParam> {
        self.params.iter().map(|raw| parse_param(raw)).collect()
    }

    pub fn isolation_level(&self) -> DbResult<Option<IsolationLevel>> {
        self.isolation_level
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Reject flag combinations clap cannot express.
    pub fn validate(&self) -> DbResult<()> {
        if self.fetch == FetchMode::Many && self.count == 0 {
            return Err(DbError::invalid_input("--count must be at least 1"));
        }
        if self.isolation_level.is_some() && !self.transaction {
            return Err(DbError::invalid_input(
                "--isolation-level requires --transaction",
            ));
        }
        Ok(())
    }
}

/// JSON literal, falling back to plain text.
fn parse_param(raw: &str) -> QueryParam {
    serde_json::from_str(raw).unwrap_or_else(|_| QueryParam::String(raw.to_string()))
}
