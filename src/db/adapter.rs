//! Connection adapter and cursor contracts.
//!
//! A `ConnectionAdapter` wraps one native driver connection. Every boolean-returning
//! operation reports success or failure without raising; `get_cursor` is the only call
//! that fails, with `DbError::ConnectionNotActive`, when no connection is open.

use crate::db::transaction::IsolationLevel;
use crate::error::DbResult;
use crate::models::{ConnectionConfig, QueryParam, Row};
use parking_lot::Mutex;
use std::sync::Arc;

/// Rows handed out by `fetchmany(0)`, mirroring a DB-API cursor's default `arraysize`.
pub const DEFAULT_ARRAY_SIZE: usize = 1;

/// Statement cursor obtained from a live adapter.
///
/// The cursor borrows its adapter; callers must `close` it before releasing the adapter.
pub trait Cursor {
    /// Execute one statement, replacing any previously buffered result.
    fn execute(&mut self, query: &str, params: &[QueryParam]) -> DbResult<()>;

    /// Execute the same statement once per parameter row.
    fn executemany(&mut self, query: &str, rows: &[Vec<QueryParam>]) -> DbResult<()>;

    fn fetchone(&mut self) -> DbResult<Option<Row>>;

    /// Fetch up to `count` rows; `0` means `DEFAULT_ARRAY_SIZE`.
    fn fetchmany(&mut self, count: usize) -> DbResult<Vec<Row>>;

    fn fetchall(&mut self) -> DbResult<Vec<Row>>;

    /// Rows affected by the last statement, if known.
    fn rowcount(&self) -> Option<u64>;

    /// Identifier generated by the last insert, if the backend reports one.
    fn lastrowid(&self) -> Option<i64>;

    fn close(&mut self) -> DbResult<()>;
}

/// Wrapper around a native DBMS connection.
pub trait ConnectionAdapter: Send {
    fn connect(&mut self, config: &ConnectionConfig) -> bool;

    /// Re-establish the connection with the config of the last `connect`.
    fn reconnect(&mut self) -> bool;

    /// Open a cursor whose statements use `placeholder` as the parameter token.
    fn get_cursor(&mut self, placeholder: &str) -> DbResult<Box<dyn Cursor + '_>>;

    fn commit(&mut self) -> bool;

    fn rollback(&mut self) -> bool;

    fn close(&mut self) -> bool;

    fn is_active(&self) -> bool;

    fn ping(&mut self) -> bool;

    /// Start an explicit transaction. Adapters without transaction control keep autocommit.
    fn begin_transaction(&mut self, isolation_level: Option<IsolationLevel>) -> bool {
        let _ = isolation_level;
        true
    }

    /// `false` once the transaction opened by `begin_transaction` is gone, e.g. after the
    /// connection was closed or the adapter replaced. Adapters without transaction control
    /// keep the default.
    fn transaction_intact(&self) -> bool {
        true
    }
}

/// Handle to the one adapter a connection manager owns.
///
/// The manager swaps the boxed adapter in place, so handles held elsewhere (the
/// transaction manager) always reach the current adapter.
pub type SharedConnection = Arc<Mutex<Box<dyn ConnectionAdapter>>>;

/// Wrap an adapter into a shareable handle.
pub fn share_adapter(adapter: Box<dyn ConnectionAdapter>) -> SharedConnection {
    Arc::new(Mutex::new(adapter))
}
