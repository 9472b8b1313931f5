//! Database facade.
//!
//! `SingleConnectionDatabase` composes one `ConnectionManager` and one
//! `TransactionManager`, runs queries over the managed connection, and notifies
//! logger observers around query execution.
//!
//! # Query execution
//!
//! Every query entry point goes through one executor which:
//! 1. fails with `ConnectionNotActive` when the health check fails, before any cursor exists
//! 2. takes the live connection and hands it to the transaction manager
//! 3. opens a cursor keyed to the current placeholder, executes and fetches
//! 4. closes the cursor on every path

use crate::config::DEFAULT_QUERY_PLACEHOLDER;
use crate::db::adapter::{ConnectionAdapter, Cursor, SharedConnection};
use crate::db::connection_manager::{
    ConnectionManager, NullConnectionManager, SingleConnectionManager,
};
use crate::db::placeholder::validate_placeholder;
use crate::db::transaction::{
    DefaultTransactionManager, IsolationLevel, NullTransactionManager, TransactionManager,
    TransactionState,
};
use crate::error::{DbError, DbResult};
use crate::logging::{LogEntryFactory, LogLevel, LoggerObserver, LoggerObservers, LoggerSubject};
use crate::models::{ConnectionConfig, QueryParam, Row};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query execution contract.
pub trait QueryInterface {
    /// Execute a statement without fetching. Returns the affected row count when known.
    fn execute_query_no_returns(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<u64>>;

    fn execute_query_returns_one(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<Row>>;

    fn execute_query_returns_many(
        &mut self,
        query: &str,
        params: &[QueryParam],
        returns_count: usize,
    ) -> DbResult<Vec<Row>>;

    fn execute_query_returns_all(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>>;
}

/// A facade that owns its connection and transaction components.
pub trait Database: QueryInterface + LoggerSubject {
    /// Release the connection and replace both managers with null variants.
    /// Safe to call more than once.
    fn deconstruct_database_and_components(&mut self) -> DbResult<()>;
}

pub struct SingleConnectionDatabase {
    connection_manager: Box<dyn ConnectionManager>,
    transaction_manager: Box<dyn TransactionManager>,
    query_param_placeholder: String,
    observers: LoggerObservers,
    log_entry_factory: Arc<LogEntryFactory>,
}

impl std::fmt::Debug for SingleConnectionDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleConnectionDatabase")
            .field("query_param_placeholder", &self.query_param_placeholder)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl Default for SingleConnectionDatabase {
    /// Unconfigured facade: null managers, default placeholder.
    fn default() -> Self {
        Self::new(
            Box::new(NullConnectionManager),
            Box::new(NullTransactionManager),
            Arc::new(LogEntryFactory::new()),
        )
    }
}

impl SingleConnectionDatabase {
    pub fn new(
        connection_manager: Box<dyn ConnectionManager>,
        mut transaction_manager: Box<dyn TransactionManager>,
        log_entry_factory: Arc<LogEntryFactory>,
    ) -> Self {
        transaction_manager.set_query_param_placeholder(DEFAULT_QUERY_PLACEHOLDER);
        Self {
            connection_manager,
            transaction_manager,
            query_param_placeholder: DEFAULT_QUERY_PLACEHOLDER.to_string(),
            observers: LoggerObservers::new(),
            log_entry_factory,
        }
    }

    /// Wire a connection manager and transaction manager around `adapter` and connect.
    pub fn open(
        adapter: Box<dyn ConnectionAdapter>,
        config: ConnectionConfig,
        placeholder: &str,
    ) -> DbResult<Self> {
        let placeholder = validate_placeholder(placeholder)?;
        let mut connection_manager = SingleConnectionManager::new(adapter, config)?;
        if !connection_manager.initialize_new_connection()? {
            return Err(DbError::connection(
                "Adapter could not connect with the given config",
                "Check the connection parameters and that the server is reachable",
            ));
        }
        let connection = connection_manager.get_connection()?;

        let mut database = Self::new(
            Box::new(connection_manager),
            Box::new(DefaultTransactionManager::with_connection(connection)),
            Arc::new(LogEntryFactory::new()),
        );
        database.change_query_param_placeholder(&placeholder)?;
        info!(placeholder = %database.query_param_placeholder, "Database opened");
        Ok(database)
    }

    pub fn query_param_placeholder(&self) -> &str {
        &self.query_param_placeholder
    }

    pub fn log_entry_factory(&self) -> &Arc<LogEntryFactory> {
        &self.log_entry_factory
    }

    pub fn connection_config(&self) -> DbResult<&ConnectionConfig> {
        self.connection_manager.config()
    }

    pub fn check_connection_status(&mut self) -> DbResult<bool> {
        self.connection_manager.check_connection_status()
    }

    /// Validate and store a new placeholder, keeping the transaction manager in sync.
    pub fn change_query_param_placeholder(&mut self, placeholder: &str) -> DbResult<()> {
        let placeholder = validate_placeholder(placeholder)?;
        debug!(from = %self.query_param_placeholder, to = %placeholder, "Placeholder changed");
        self.transaction_manager
            .set_query_param_placeholder(&placeholder);
        self.query_param_placeholder = placeholder;
        Ok(())
    }

    /// Returns `false` when the config is unchanged.
    pub fn set_new_connection_config(&mut self, config: ConnectionConfig) -> DbResult<bool> {
        self.connection_manager.set_new_config(config)
    }

    pub fn set_new_connection_adapter(
        &mut self,
        adapter: Box<dyn ConnectionAdapter>,
    ) -> DbResult<()> {
        self.connection_manager.set_new_adapter(adapter)
    }

    pub fn set_new_connection_manager(&mut self, connection_manager: Box<dyn ConnectionManager>) {
        info!("Connection manager replaced");
        self.connection_manager = connection_manager;
    }

    /// Install a transaction manager, primed with the placeholder and, when the
    /// connection is healthy, the live connection.
    pub fn set_new_transaction_manager(
        &mut self,
        mut transaction_manager: Box<dyn TransactionManager>,
    ) -> DbResult<()> {
        transaction_manager.set_query_param_placeholder(&self.query_param_placeholder);
        if matches!(self.connection_manager.check_connection_status(), Ok(true)) {
            transaction_manager.set_active_connection(self.connection_manager.get_connection()?);
        }
        self.transaction_manager = transaction_manager;
        info!("Transaction manager replaced");
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_transaction(&mut self) -> DbResult<()> {
        self.refresh_transaction_connection()?;
        self.transaction_manager.begin()
    }

    pub fn execute_in_transaction(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        self.emit(LogLevel::Debug, format!("Executing in transaction: {query}"), "transaction");
        self.refresh_transaction_connection()?;
        let result = self
            .transaction_manager
            .execute_in_active_transaction(query, params);
        if let Err(e) = &result {
            warn!(error = %e, sql = %query, "Transactional statement failed");
            self.emit(LogLevel::Error, format!("{e} (query: {query})"), "transaction");
        }
        result
    }

    pub fn commit_transaction(&mut self) -> DbResult<()> {
        self.transaction_manager.commit()
    }

    pub fn rollback_transaction(&mut self) -> DbResult<()> {
        self.transaction_manager.rollback()
    }

    pub fn apply_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()> {
        self.transaction_manager.apply_isolation_level(level)
    }

    pub fn transaction_state(&self) -> DbResult<TransactionState> {
        self.transaction_manager.state()
    }

    fn refresh_transaction_connection(&mut self) -> DbResult<()> {
        let connection = self.connection_manager.get_connection()?;
        self.transaction_manager.set_active_connection(connection);
        Ok(())
    }

    // =========================================================================
    // Query execution
    // =========================================================================

    /// Run the same statement once per parameter row.
    pub fn execute_query_batch(
        &mut self,
        query: &str,
        rows: &[Vec<QueryParam>],
    ) -> DbResult<Option<u64>> {
        self.execute_query(query, |cursor| {
            cursor.executemany(query, rows)?;
            Ok(cursor.rowcount())
        })
    }

    fn execute_query<T>(
        &mut self,
        query: &str,
        run: impl FnOnce(&mut dyn Cursor) -> DbResult<T>,
    ) -> DbResult<T> {
        self.emit(LogLevel::Debug, format!("Executing query: {query}"), "execute_query");

        let result = self.run_on_cursor(run);
        if let Err(e) = &result {
            warn!(error = %e, sql = %query, "Query failed");
            self.emit(LogLevel::Error, format!("{e} (query: {query})"), "execute_query");
        }
        result
    }

    fn run_on_cursor<T>(&mut self, run: impl FnOnce(&mut dyn Cursor) -> DbResult<T>) -> DbResult<T> {
        if !self.connection_manager.check_connection_status()? {
            return Err(DbError::ConnectionNotActive);
        }
        let connection = self.connection_manager.get_connection()?;
        self.transaction_manager
            .set_active_connection(SharedConnection::clone(&connection));

        let mut adapter = connection.lock();
        let mut cursor = adapter.get_cursor(&self.query_param_placeholder)?;
        let result = run(cursor.as_mut());
        let closed = cursor.close();

        let value = result?;
        closed?;
        Ok(value)
    }

    fn emit(&self, level: LogLevel, message: String, context: &str) {
        let entry = self.log_entry_factory.create(level, message, context);
        self.observers.notify_logger_observers(&entry);
    }
}

impl QueryInterface for SingleConnectionDatabase {
    fn execute_query_no_returns(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<u64>> {
        self.execute_query(query, |cursor| {
            cursor.execute(query, params)?;
            Ok(cursor.rowcount())
        })
    }

    fn execute_query_returns_one(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<Row>> {
        self.execute_query(query, |cursor| {
            cursor.execute(query, params)?;
            cursor.fetchone()
        })
    }

    fn execute_query_returns_many(
        &mut self,
        query: &str,
        params: &[QueryParam],
        returns_count: usize,
    ) -> DbResult<Vec<Row>> {
        self.execute_query(query, |cursor| {
            cursor.execute(query, params)?;
            cursor.fetchmany(returns_count)
        })
    }

    fn execute_query_returns_all(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        self.execute_query(query, |cursor| {
            cursor.execute(query, params)?;
            cursor.fetchall()
        })
    }
}

impl LoggerSubject for SingleConnectionDatabase {
    fn register_logger_observer(&mut self, observer: Arc<dyn LoggerObserver>) -> bool {
        self.observers.register_logger_observer(observer)
    }

    fn remove_logger_observer(&mut self, observer: &Arc<dyn LoggerObserver>) -> bool {
        self.observers.remove_logger_observer(observer)
    }

    fn notify_logger_observers(&self, log_entry: &crate::logging::LogEntry) -> bool {
        self.observers.notify_logger_observers(log_entry)
    }
}

impl Database for SingleConnectionDatabase {
    fn deconstruct_database_and_components(&mut self) -> DbResult<()> {
        match self.connection_manager.close_connection() {
            Ok(closed) => debug!(closed, "Connection released"),
            // already deconstructed, or never configured
            Err(DbError::NullObjectOperation { .. }) => {}
            Err(e) => return Err(e),
        }
        self.connection_manager = Box::new(NullConnectionManager);
        self.transaction_manager = Box::new(NullTransactionManager);
        Ok(())
    }
}

impl Drop for SingleConnectionDatabase {
    fn drop(&mut self) {
        if let Err(e) = self.deconstruct_database_and_components() {
            warn!(error = %e, "Failed to release database components");
        }
    }
}
