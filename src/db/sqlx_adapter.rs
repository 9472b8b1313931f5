//! Connection adapter over a single sqlx connection.
//!
//! sqlx drivers are async; this adapter owns a current-thread tokio runtime and blocks
//! on every call so the rest of the crate stays synchronous. It must not be used from
//! inside another tokio runtime.
//!
//! # Architecture
//!
//! - `NativeConnection` holds the backend-specific sqlx connection
//! - `SqlxCursor` executes statements, buffering result rows as JSON maps
//! - per-backend `run` functions bind parameters and drain the result stream

use crate::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_QUERY_TIMEOUT_SECS};
use crate::db::adapter::{ConnectionAdapter, Cursor, DEFAULT_ARRAY_SIZE};
use crate::db::placeholder::rewrite_placeholders;
use crate::db::transaction::IsolationLevel;
use crate::error::{DbError, DbResult};
use crate::models::connection::{
    KEY_CONNECT_TIMEOUT, KEY_DATABASE, KEY_HOST, KEY_PASSWORD, KEY_PORT, KEY_QUERY_TIMEOUT,
    KEY_USER,
};
use crate::models::{ConnectionConfig, DatabaseType, QueryParam, Row};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, Executor, MySqlConnection, PgConnection, SqliteConnection};
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Backend-specific sqlx connection.
#[derive(Debug)]
pub enum NativeConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl NativeConnection {
    /// Get the database type for this connection.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            NativeConnection::MySql(_) => DatabaseType::MySQL,
            NativeConnection::Postgres(_) => DatabaseType::PostgreSQL,
            NativeConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// Result of one statement: buffered rows plus the driver's completion data.
#[derive(Debug, Default)]
struct StatementOutcome {
    rows: Vec<Row>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

pub struct SqlxAdapter {
    runtime: Runtime,
    connection: Option<NativeConnection>,
    config: Option<ConnectionConfig>,
    in_transaction: bool,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl std::fmt::Debug for SqlxAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxAdapter")
            .field("db_type", &self.connection.as_ref().map(NativeConnection::db_type))
            .field("config", &self.config)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl SqlxAdapter {
    /// Create a disconnected adapter with its own runtime.
    pub fn new() -> DbResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::internal(format!("Failed to start adapter runtime: {e}")))?;

        Ok(Self {
            runtime,
            connection: None,
            config: None,
            in_transaction: false,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        })
    }

    /// Backend of the open connection.
    pub fn db_type(&self) -> Option<DatabaseType> {
        self.connection.as_ref().map(NativeConnection::db_type)
    }

    /// Apply timeouts from the config, then open the native connection.
    fn open(&mut self, config: &ConnectionConfig) -> DbResult<NativeConnection> {
        let db_type = config.database_type().ok_or_else(|| {
            DbError::invalid_input("Connection config needs a 'driver' of mysql, postgres or sqlite")
        })?;

        self.connect_timeout = Duration::from_secs(
            config
                .get_u64(KEY_CONNECT_TIMEOUT)?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );
        self.query_timeout = Duration::from_secs(
            config
                .get_u64(KEY_QUERY_TIMEOUT)?
                .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
        );

        let port = config
            .get_u64(KEY_PORT)?
            .map(|p| {
                u16::try_from(p).map_err(|_| DbError::invalid_input(format!("Port out of range: {p}")))
            })
            .transpose()?;
        let connect_timeout = self.connect_timeout;

        let pending = async {
            match db_type {
                DatabaseType::MySQL => {
                    let mut options = MySqlConnectOptions::new()
                        .host(config.get(KEY_HOST).unwrap_or("localhost"))
                        .port(port.unwrap_or(3306))
                        .charset("utf8mb4");
                    if let Some(user) = config.get(KEY_USER) {
                        options = options.username(user);
                    }
                    if let Some(password) = config.get(KEY_PASSWORD) {
                        options = options.password(password);
                    }
                    if let Some(database) = config.get(KEY_DATABASE) {
                        options = options.database(database);
                    }
                    options.connect().await.map(NativeConnection::MySql)
                }
                DatabaseType::PostgreSQL => {
                    let mut options = PgConnectOptions::new()
                        .host(config.get(KEY_HOST).unwrap_or("localhost"))
                        .port(port.unwrap_or(5432));
                    if let Some(user) = config.get(KEY_USER) {
                        options = options.username(user);
                    }
                    if let Some(password) = config.get(KEY_PASSWORD) {
                        options = options.password(password);
                    }
                    if let Some(database) = config.get(KEY_DATABASE) {
                        options = options.database(database);
                    }
                    options.connect().await.map(NativeConnection::Postgres)
                }
                DatabaseType::SQLite => {
                    let options = match config.get(KEY_DATABASE) {
                        None | Some("") | Some(":memory:") => {
                            SqliteConnectOptions::from_str("sqlite::memory:")
                        }
                        Some(path) => Ok(SqliteConnectOptions::new()
                            .filename(path)
                            .create_if_missing(true)),
                    };
                    match options {
                        Ok(options) => options.connect().await.map(NativeConnection::SQLite),
                        Err(e) => Err(e),
                    }
                }
            }
        };

        match self.runtime.block_on(timeout(connect_timeout, pending)) {
            Ok(result) => result.map_err(|e| {
                DbError::connection(format!("Failed to connect: {e}"), connection_suggestion(db_type, &e))
            }),
            Err(_) => Err(DbError::timeout("connect", connect_timeout.as_secs())),
        }
    }

    /// Run a raw statement on the open connection.
    fn execute_raw(&mut self, sql: &str) -> DbResult<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(DbError::ConnectionNotActive)?;
        let query_timeout = self.query_timeout;
        let pending = async {
            native_dispatch!(connection, conn => conn.execute(sql).await.map(|_| ()))
        };
        match self.runtime.block_on(timeout(query_timeout, pending)) {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(DbError::timeout(sql, query_timeout.as_secs())),
        }
    }

    fn finish_transaction(&mut self, statement: &str) -> bool {
        if !self.in_transaction {
            // autocommit mode, nothing pending
            return self.connection.is_some();
        }
        match self.execute_raw(statement) {
            Ok(()) => {
                self.in_transaction = false;
                true
            }
            Err(e) => {
                warn!(error = %e, statement, "Failed to finish transaction");
                false
            }
        }
    }
}

impl ConnectionAdapter for SqlxAdapter {
    fn connect(&mut self, config: &ConnectionConfig) -> bool {
        if self.connection.is_some() {
            self.close();
        }
        match self.open(config) {
            Ok(connection) => {
                info!(db_type = %connection.db_type(), "Connected");
                self.connection = Some(connection);
                self.config = Some(config.clone());
                true
            }
            Err(e) => {
                warn!(error = %e, suggestion = ?e.suggestion(), "Connect failed");
                self.config = Some(config.clone());
                false
            }
        }
    }

    fn reconnect(&mut self) -> bool {
        let Some(config) = self.config.clone() else {
            warn!("Reconnect requested before any connect");
            return false;
        };
        debug!("Reconnecting");
        self.connect(&config)
    }

    fn get_cursor(&mut self, placeholder: &str) -> DbResult<Box<dyn Cursor + '_>> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(DbError::ConnectionNotActive)?;
        Ok(Box::new(SqlxCursor {
            runtime: &self.runtime,
            connection,
            placeholder: placeholder.to_string(),
            query_timeout: self.query_timeout,
            rows: VecDeque::new(),
            rows_affected: None,
            last_insert_id: None,
            closed: false,
        }))
    }

    fn commit(&mut self) -> bool {
        self.finish_transaction("COMMIT")
    }

    fn rollback(&mut self) -> bool {
        self.finish_transaction("ROLLBACK")
    }

    fn close(&mut self) -> bool {
        let Some(connection) = self.connection.take() else {
            return false;
        };
        if std::mem::take(&mut self.in_transaction) {
            warn!("Closing connection with an open transaction, the server rolls it back");
        }
        let closed = self
            .runtime
            .block_on(async { native_dispatch!(connection, conn => conn.close().await) });
        match closed {
            Ok(()) => {
                debug!("Connection closed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Connection closed with error");
                false
            }
        }
    }

    fn is_active(&self) -> bool {
        self.connection.is_some()
    }

    fn ping(&mut self) -> bool {
        let connect_timeout = self.connect_timeout;
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        let pending = async { native_dispatch!(connection, conn => conn.ping().await) };
        match self.runtime.block_on(timeout(connect_timeout, pending)) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Ping failed");
                false
            }
            Err(_) => {
                debug!("Ping timed out");
                false
            }
        }
    }

    fn begin_transaction(&mut self, isolation_level: Option<IsolationLevel>) -> bool {
        let Some(db_type) = self.db_type() else {
            return false;
        };
        let statements: Vec<String> = match (db_type, isolation_level) {
            (DatabaseType::MySQL, Some(level)) => vec![
                format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
                "START TRANSACTION".to_string(),
            ],
            (DatabaseType::MySQL, None) => vec!["START TRANSACTION".to_string()],
            (DatabaseType::PostgreSQL, Some(level)) => {
                vec![format!("BEGIN ISOLATION LEVEL {}", level.as_sql())]
            }
            (DatabaseType::PostgreSQL, None) => vec!["BEGIN".to_string()],
            (DatabaseType::SQLite, level) => {
                if level.is_some() {
                    debug!("SQLite ignores isolation levels; transactions are serializable");
                }
                vec!["BEGIN".to_string()]
            }
        };

        for statement in &statements {
            if let Err(e) = self.execute_raw(statement) {
                warn!(error = %e, statement = %statement, "Failed to begin transaction");
                return false;
            }
        }
        self.in_transaction = true;
        true
    }

    fn transaction_intact(&self) -> bool {
        self.in_transaction
    }
}

impl Drop for SqlxAdapter {
    fn drop(&mut self) {
        if self.connection.is_some() {
            self.close();
        }
    }
}

/// Cursor over the adapter's connection.
pub struct SqlxCursor<'a> {
    runtime: &'a Runtime,
    connection: &'a mut NativeConnection,
    placeholder: String,
    query_timeout: Duration,
    rows: VecDeque<Row>,
    rows_affected: Option<u64>,
    last_insert_id: Option<i64>,
    closed: bool,
}

impl SqlxCursor<'_> {
    fn ensure_open(&self) -> DbResult<()> {
        if self.closed {
            return Err(DbError::invalid_input("Cursor is closed"));
        }
        Ok(())
    }

    fn run_statement(&mut self, query: &str, params: &[QueryParam]) -> DbResult<StatementOutcome> {
        let sql = rewrite_placeholders(query, &self.placeholder, self.connection.db_type());
        debug!(sql = %sql, params = params.len(), "Executing statement");

        let runtime = self.runtime;
        let query_timeout = self.query_timeout;
        let pending = async {
            match &mut *self.connection {
                NativeConnection::MySql(conn) => mysql::run(conn, &sql, params).await,
                NativeConnection::Postgres(conn) => postgres::run(conn, &sql, params).await,
                NativeConnection::SQLite(conn) => sqlite::run(conn, &sql, params).await,
            }
        };
        match runtime.block_on(timeout(query_timeout, pending)) {
            Ok(result) => result,
            Err(_) => {
                warn!(sql = %sql, "Statement timed out");
                Err(DbError::timeout("query execution", query_timeout.as_secs()))
            }
        }
    }
}

impl Cursor for SqlxCursor<'_> {
    fn execute(&mut self, query: &str, params: &[QueryParam]) -> DbResult<()> {
        self.ensure_open()?;
        let outcome = self.run_statement(query, params)?;
        self.rows = outcome.rows.into();
        self.rows_affected = Some(outcome.rows_affected);
        self.last_insert_id = outcome.last_insert_id;
        Ok(())
    }

    fn executemany(&mut self, query: &str, rows: &[Vec<QueryParam>]) -> DbResult<()> {
        self.ensure_open()?;
        self.rows.clear();
        let mut rows_affected = 0;
        for params in rows {
            let outcome = self.run_statement(query, params)?;
            rows_affected += outcome.rows_affected;
            if outcome.last_insert_id.is_some() {
                self.last_insert_id = outcome.last_insert_id;
            }
        }
        self.rows_affected = Some(rows_affected);
        Ok(())
    }

    fn fetchone(&mut self) -> DbResult<Option<Row>> {
        self.ensure_open()?;
        Ok(self.rows.pop_front())
    }

    fn fetchmany(&mut self, count: usize) -> DbResult<Vec<Row>> {
        self.ensure_open()?;
        let count = if count == 0 { DEFAULT_ARRAY_SIZE } else { count };
        let take = count.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }

    fn fetchall(&mut self) -> DbResult<Vec<Row>> {
        self.ensure_open()?;
        Ok(self.rows.drain(..).collect())
    }

    fn rowcount(&self) -> Option<u64> {
        self.rows_affected
    }

    fn lastrowid(&self) -> Option<i64> {
        self.last_insert_id
    }

    fn close(&mut self) -> DbResult<()> {
        self.rows.clear();
        self.closed = true;
        Ok(())
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the user and password parameters".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    match db_type {
        DatabaseType::SQLite => "Verify the database file path is accessible".to_string(),
        _ => format!(
            "Verify host, port and credentials; default port is {}",
            db_type.default_port().unwrap_or_default()
        ),
    }
}

// =============================================================================
// Backend-Specific Statement Execution
// =============================================================================
//
// Each module drains `fetch_many`, collecting rows and summing completion results.

mod mysql {
    use super::*;
    use crate::db::params::bound_query;
    use crate::db::types::RowToJson;
    use futures_util::TryStreamExt;
    use sqlx::Either;

    pub(super) async fn run(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<StatementOutcome> {
        let query = bound_query::<sqlx::MySql>(sql, params);

        let mut outcome = StatementOutcome::default();
        let mut stream = Executor::fetch_many(&mut *conn, query);
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => {
                    outcome.rows_affected += done.rows_affected();
                    if done.last_insert_id() > 0 {
                        outcome.last_insert_id = i64::try_from(done.last_insert_id()).ok();
                    }
                }
                Either::Right(row) => outcome.rows.push(row.to_json_map()),
            }
        }
        Ok(outcome)
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bound_query;
    use crate::db::types::RowToJson;
    use futures_util::TryStreamExt;
    use sqlx::Either;

    pub(super) async fn run(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<StatementOutcome> {
        let query = bound_query::<sqlx::Postgres>(sql, params);

        let mut outcome = StatementOutcome::default();
        let mut stream = Executor::fetch_many(&mut *conn, query);
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => outcome.rows_affected += done.rows_affected(),
                Either::Right(row) => outcome.rows.push(row.to_json_map()),
            }
        }
        Ok(outcome)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bound_query;
    use crate::db::types::RowToJson;
    use futures_util::TryStreamExt;
    use sqlx::Either;

    pub(super) async fn run(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<StatementOutcome> {
        let query = bound_query::<sqlx::Sqlite>(sql, params);

        let mut outcome = StatementOutcome::default();
        let mut stream = Executor::fetch_many(&mut *conn, query);
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => {
                    outcome.rows_affected += done.rows_affected();
                    outcome.last_insert_id = Some(done.last_insert_rowid());
                }
                Either::Right(row) => outcome.rows.push(row.to_json_map()),
            }
        }
        Ok(outcome)
    }
}
