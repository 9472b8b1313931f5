//! Transaction management over the shared connection.
//!
//! `DefaultTransactionManager` holds the current `TransactionState`, the connection
//! handle and the isolation level, and forwards every operation to the current
//! state. Entering a state runs its adapter action once:
//!
//! - Active: `begin_transaction(isolation_level)`
//! - Committed: `commit()`
//! - RolledBack: `rollback()`

mod state;

pub use state::TransactionState;

use crate::config::DEFAULT_QUERY_PLACEHOLDER;
use crate::db::adapter::SharedConnection;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Row};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// SQL transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted = 1,
    ReadCommitted = 2,
    RepeatableRead = 3,
    Serializable = 4,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<u8> for IsolationLevel {
    type Error = DbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ReadUncommitted),
            2 => Ok(Self::ReadCommitted),
            3 => Ok(Self::RepeatableRead),
            4 => Ok(Self::Serializable),
            _ => Err(DbError::invalid_argument(
                "isolation_level",
                "1 (read uncommitted) to 4 (serializable)",
            )),
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = DbError;

    /// Accepts `read_committed`, `READ COMMITTED`, `read-committed`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '-' | ' ' => ' ',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match normalized.as_str() {
            "READ UNCOMMITTED" => Ok(Self::ReadUncommitted),
            "READ COMMITTED" => Ok(Self::ReadCommitted),
            "REPEATABLE READ" => Ok(Self::RepeatableRead),
            "SERIALIZABLE" => Ok(Self::Serializable),
            _ => Err(DbError::invalid_argument(
                "isolation_level",
                "one of read_uncommitted, read_committed, repeatable_read, serializable",
            )),
        }
    }
}

/// Transaction lifecycle contract.
pub trait TransactionManager: Send {
    /// Make sure the connection is live before a transaction starts.
    fn begin(&mut self) -> DbResult<()>;

    /// Run a statement inside the transaction, starting it if needed.
    ///
    /// Returns the rows the statement produced; empty when the current state ignores
    /// the call.
    fn execute_in_active_transaction(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// Isolation level used by the next transaction start.
    fn apply_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()>;

    fn isolation_level(&self) -> DbResult<Option<IsolationLevel>>;

    /// Replace the current state without running its entry action.
    fn set_state(&mut self, state: TransactionState) -> DbResult<()>;

    fn state(&self) -> DbResult<TransactionState>;

    fn set_active_connection(&mut self, connection: SharedConnection);

    fn set_query_param_placeholder(&mut self, placeholder: &str);
}

pub struct DefaultTransactionManager {
    state: TransactionState,
    connection: Option<SharedConnection>,
    isolation_level: Option<IsolationLevel>,
    placeholder: String,
}

impl std::fmt::Debug for DefaultTransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultTransactionManager")
            .field("state", &self.state)
            .field("has_connection", &self.connection.is_some())
            .field("isolation_level", &self.isolation_level)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

impl Default for DefaultTransactionManager {
    fn default() -> Self {
        Self {
            state: TransactionState::Initialized,
            connection: None,
            isolation_level: None,
            placeholder: DEFAULT_QUERY_PLACEHOLDER.to_string(),
        }
    }
}

impl DefaultTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(connection: SharedConnection) -> Self {
        Self {
            connection: Some(connection),
            ..Self::default()
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    fn connection(&self) -> DbResult<&SharedConnection> {
        self.connection.as_ref().ok_or(DbError::ConnectionNotActive)
    }

    // Re-dispatch entry points used by the states after a transition.

    fn begin_in_current_state(&mut self) -> DbResult<()> {
        self.state.begin(self)
    }

    fn execute_in_current_state(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        self.state.execute(self, query, params)
    }

    fn commit_in_current_state(&mut self) -> DbResult<()> {
        self.state.commit(self)
    }

    fn rollback_in_current_state(&mut self) -> DbResult<()> {
        self.state.rollback(self)
    }

    /// Move to `next`, running its adapter action. A refused action keeps the current state.
    ///
    /// A commit whose transaction the adapter no longer holds fails and resets to
    /// Initialized, so the next statement opens a fresh transaction.
    fn transition_to(&mut self, next: TransactionState) -> DbResult<()> {
        if next == TransactionState::Committed && !self.connection()?.lock().transaction_intact() {
            warn!(from = %self.state, "Transaction lost before commit");
            self.state = TransactionState::Initialized;
            return Err(DbError::transaction(
                "Transaction lost before commit: the connection was closed or replaced",
                self.state.name(),
            ));
        }

        let accepted = match next {
            TransactionState::Initialized => true,
            TransactionState::Active => {
                let isolation_level = self.isolation_level;
                self.connection()?.lock().begin_transaction(isolation_level)
            }
            TransactionState::Committed => self.connection()?.lock().commit(),
            TransactionState::RolledBack => self.connection()?.lock().rollback(),
        };

        if !accepted {
            warn!(from = %self.state, to = %next, "Adapter refused state entry");
            return Err(DbError::transaction(
                format!("Connection refused to enter the {next} state"),
                self.state.name(),
            ));
        }

        info!(from = %self.state, to = %next, "Transaction state changed");
        self.state = next;
        Ok(())
    }

    /// Reconnect when the adapter reports inactive.
    fn ensure_connection_live(&mut self) -> DbResult<()> {
        let mut adapter = self.connection()?.lock();
        if adapter.is_active() {
            return Ok(());
        }
        debug!("Connection inactive at transaction begin, reconnecting");
        if adapter.reconnect() {
            Ok(())
        } else {
            warn!("Reconnect failed at transaction begin");
            Err(DbError::ConnectionNotActive)
        }
    }

    /// Execute on a fresh cursor; the cursor is closed on every path.
    fn run_statement(&mut self, query: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        let placeholder = self.placeholder.clone();
        let mut adapter = self.connection()?.lock();
        let mut cursor = adapter.get_cursor(&placeholder)?;

        let result = cursor
            .execute(query, params)
            .and_then(|()| cursor.fetchall());
        let closed = cursor.close();

        let rows = result?;
        closed?;
        debug!(rows = rows.len(), "Statement executed in transaction");
        Ok(rows)
    }
}

impl TransactionManager for DefaultTransactionManager {
    fn begin(&mut self) -> DbResult<()> {
        self.begin_in_current_state()
    }

    fn execute_in_active_transaction(
        &mut self,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        self.execute_in_current_state(query, params)
    }

    fn commit(&mut self) -> DbResult<()> {
        self.commit_in_current_state()
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.rollback_in_current_state()
    }

    fn apply_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()> {
        debug!(isolation_level = %level, "Isolation level applied");
        self.isolation_level = Some(level);
        Ok(())
    }

    fn isolation_level(&self) -> DbResult<Option<IsolationLevel>> {
        Ok(self.isolation_level)
    }

    fn set_state(&mut self, state: TransactionState) -> DbResult<()> {
        debug!(from = %self.state, to = %state, "Transaction state replaced");
        self.state = state;
        Ok(())
    }

    fn state(&self) -> DbResult<TransactionState> {
        Ok(self.state)
    }

    fn set_active_connection(&mut self, connection: SharedConnection) {
        self.connection = Some(connection);
    }

    fn set_query_param_placeholder(&mut self, placeholder: &str) {
        self.placeholder = placeholder.to_string();
    }
}

/// Stand-in used before a real transaction manager is injected.
///
/// Every lifecycle call fails with `NullObjectOperation`. The connection and
/// placeholder setters are inert so a facade can keep them in sync regardless.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransactionManager;

impl TransactionManager for NullTransactionManager {
    fn begin(&mut self) -> DbResult<()> {
        Err(DbError::null_object("TransactionManager::begin"))
    }

    fn execute_in_active_transaction(
        &mut self,
        _query: &str,
        _params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        Err(DbError::null_object(
            "TransactionManager::execute_in_active_transaction",
        ))
    }

    fn commit(&mut self) -> DbResult<()> {
        Err(DbError::null_object("TransactionManager::commit"))
    }

    fn rollback(&mut self) -> DbResult<()> {
        Err(DbError::null_object("TransactionManager::rollback"))
    }

    fn apply_isolation_level(&mut self, _level: IsolationLevel) -> DbResult<()> {
        Err(DbError::null_object("TransactionManager::apply_isolation_level"))
    }

    fn isolation_level(&self) -> DbResult<Option<IsolationLevel>> {
        Err(DbError::null_object("TransactionManager::isolation_level"))
    }

    fn set_state(&mut self, _state: TransactionState) -> DbResult<()> {
        Err(DbError::null_object("TransactionManager::set_state"))
    }

    fn state(&self) -> DbResult<TransactionState> {
        Err(DbError::null_object("TransactionManager::state"))
    }

    fn set_active_connection(&mut self, _connection: SharedConnection) {}

    fn set_query_param_placeholder(&mut self, _placeholder: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_from_u8() {
        assert_eq!(
            IsolationLevel::try_from(1).unwrap(),
            IsolationLevel::ReadUncommitted
        );
        assert_eq!(
            IsolationLevel::try_from(4).unwrap(),
            IsolationLevel::Serializable
        );
        assert!(matches!(
            IsolationLevel::try_from(0),
            Err(DbError::InvalidArgumentType { .. })
        ));
        assert!(IsolationLevel::try_from(5).is_err());
    }

    #[test]
    fn test_isolation_level_from_str() {
        assert_eq!(
            "read_committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "REPEATABLE READ".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            " serializable ".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!(matches!(
            "snapshot".parse::<IsolationLevel>(),
            Err(DbError::InvalidArgumentType { .. })
        ));
    }

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.as_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::Serializable.to_string(), "SERIALIZABLE");
    }

    #[test]
    fn test_operations_without_connection() {
        let mut manager = DefaultTransactionManager::new();
        assert!(matches!(manager.begin(), Err(DbError::ConnectionNotActive)));
        assert!(matches!(
            manager.execute_in_active_transaction("SELECT 1", &[]),
            Err(DbError::ConnectionNotActive)
        ));
        assert_eq!(manager.state().unwrap(), TransactionState::Initialized);
        // Initialized ignores commit and rollback without touching the connection
        assert!(manager.commit().is_ok());
        assert!(manager.rollback().is_ok());
    }

    #[test]
    fn test_placeholder_setter() {
        let mut manager = DefaultTransactionManager::new();
        assert_eq!(manager.placeholder(), "?");
        manager.set_query_param_placeholder("%s");
        assert_eq!(manager.placeholder(), "%s");
    }

    #[test]
    fn test_null_transaction_manager() {
        let mut manager = NullTransactionManager;
        assert!(matches!(
            manager.begin(),
            Err(DbError::NullObjectOperation { .. })
        ));
        assert!(manager.commit().is_err());
        assert!(manager.rollback().is_err());
        assert!(manager.state().is_err());
        assert!(manager.set_state(TransactionState::Active).is_err());
        assert!(
            manager
                .apply_isolation_level(IsolationLevel::Serializable)
                .is_err()
        );
        manager.set_query_param_placeholder("%s");
    }
}
