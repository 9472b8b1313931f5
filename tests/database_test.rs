//! Integration tests for the single connection database facade.

mod common;

use common::{MockAdapter, Recorder as AdapterRecorder, config, row};
use db_facade::db::{
    ConnectionManager, DefaultTransactionManager, SingleConnectionManager, TransactionState,
};
use db_facade::error::DbError;
use db_facade::logging::{LogEntry, LogLevel, LoggerObserver, LoggerSubject};
use db_facade::models::QueryParam;
use db_facade::{Database, QueryInterface, SingleConnectionDatabase};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl LoggerObserver for Recorder {
    fn update(&self, log_entry: &LogEntry) {
        self.entries
            .lock()
            .push((log_entry.level(), log_entry.message_text().to_string()));
    }
}

fn open() -> (SingleConnectionDatabase, AdapterRecorder) {
    let (adapter, recorder) = MockAdapter::new();
    let database = SingleConnectionDatabase::open(adapter.boxed(), config("d"), "?").unwrap();
    (database, recorder)
}

fn three_rows() -> Vec<db_facade::models::Row> {
    (1..=3).map(|i| row(&[("id", json!(i))])).collect()
}

#[test]
fn test_open_connects_once() {
    let (database, recorder) = open();
    assert_eq!(recorder.lock().connect_calls, 1);
    assert_eq!(database.query_param_placeholder(), "?");
    assert_eq!(database.connection_config().unwrap(), &config("d"));
}

#[test]
fn test_open_fails_when_adapter_cannot_connect() {
    let (adapter, recorder) = MockAdapter::new();
    recorder.lock().connect_ok = false;

    let result = SingleConnectionDatabase::open(adapter.boxed(), config("d"), "?");
    assert!(matches!(result, Err(DbError::Connection { .. })));
}

#[test]
fn test_inactive_connection_fails_without_cursor() {
    let (mut database, recorder) = open();
    recorder.lock().active = false;

    assert!(matches!(
        database.execute_query_no_returns("DELETE FROM t", &[]),
        Err(DbError::ConnectionNotActive)
    ));
    let state = recorder.lock();
    assert_eq!(state.cursor_calls, 0);
    assert!(state.executed.is_empty());
}

#[test]
fn test_fetch_strategies() {
    let (mut database, recorder) = open();
    recorder.lock().rows = three_rows();

    let affected = database
        .execute_query_no_returns("UPDATE t SET a = ?", &[QueryParam::Int(1)])
        .unwrap();
    assert_eq!(affected, Some(3));

    let one = database.execute_query_returns_one("SELECT id FROM t", &[]).unwrap();
    assert_eq!(one, Some(row(&[("id", json!(1))])));

    let many = database
        .execute_query_returns_many("SELECT id FROM t", &[], 2)
        .unwrap();
    assert_eq!(many.len(), 2);

    let all = database.execute_query_returns_all("SELECT id FROM t", &[]).unwrap();
    assert_eq!(all, three_rows());

    let state = recorder.lock();
    assert_eq!(state.executed.len(), 4);
    assert_eq!(state.executed[0].1, vec![QueryParam::Int(1)]);
    // every cursor was closed
    assert_eq!(state.cursor_calls, 4);
    assert_eq!(state.cursor_closes, 4);
}

#[test]
fn test_returns_many_zero_uses_default_array_size() {
    let (mut database, recorder) = open();
    recorder.lock().rows = three_rows();

    let rows = database
        .execute_query_returns_many("SELECT id FROM t", &[], 0)
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_returns_one_on_empty_result() {
    let (mut database, _probe) = open();
    assert_eq!(
        database.execute_query_returns_one("SELECT id FROM t WHERE 0", &[]).unwrap(),
        None
    );
}

#[test]
fn test_failed_query_closes_cursor_and_logs_error() {
    let (mut database, adapter_state) = open();
    let recorder = Arc::new(Recorder::default());
    database.register_logger_observer(recorder.clone());
    adapter_state.lock().fail_execute = true;

    let result = database.execute_query_returns_all("SELECT broken", &[]);
    assert!(matches!(result, Err(DbError::Database { .. })));

    {
        let state = adapter_state.lock();
        assert_eq!(state.cursor_calls, 1);
        assert_eq!(state.cursor_closes, 1);
    }
    let entries = recorder.entries.lock();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, LogLevel::Debug);
    assert!(entries[0].1.contains("SELECT broken"));
    assert_eq!(entries[1].0, LogLevel::Error);
}

#[test]
fn test_duplicate_observer_is_notified_once() {
    let (mut database, _probe) = open();
    let recorder = Arc::new(Recorder::default());
    let observer: Arc<dyn LoggerObserver> = recorder.clone();

    assert!(database.register_logger_observer(observer.clone()));
    assert!(!database.register_logger_observer(observer.clone()));

    database.execute_query_no_returns("SELECT 1", &[]).unwrap();
    assert_eq!(recorder.entries.lock().len(), 1);

    assert!(database.remove_logger_observer(&observer));
    assert!(!database.remove_logger_observer(&observer));
    database.execute_query_no_returns("SELECT 1", &[]).unwrap();
    assert_eq!(recorder.entries.lock().len(), 1);
}

#[test]
fn test_notify_without_observers_returns_false() {
    let (database, _probe) = open();
    let entry = database
        .log_entry_factory()
        .create(LogLevel::Info, "nobody listens", "test");
    assert!(!database.notify_logger_observers(&entry));
}

#[test]
fn test_placeholder_change_reaches_both_layers() {
    let (mut database, recorder) = open();
    database.change_query_param_placeholder("%s").unwrap();

    database
        .execute_query_no_returns("SELECT %s", &[QueryParam::Int(1)])
        .unwrap();
    database.begin_transaction().unwrap();
    database
        .execute_in_transaction("SELECT %s", &[QueryParam::Int(2)])
        .unwrap();

    assert_eq!(
        recorder.lock().placeholders,
        vec!["%s".to_string(), "%s".to_string()]
    );
}

#[test]
fn test_invalid_placeholder_is_rejected() {
    let (mut database, _probe) = open();
    assert!(matches!(
        database.change_query_param_placeholder("? "),
        Err(DbError::InvalidArgumentType { .. })
    ));
    assert_eq!(database.query_param_placeholder(), "?");
}

#[test]
fn test_transaction_through_facade() {
    let (mut database, recorder) = open();

    database.begin_transaction().unwrap();
    assert_eq!(
        database.transaction_state().unwrap(),
        TransactionState::Initialized
    );

    database
        .execute_in_transaction("INSERT INTO t VALUES (?)", &[QueryParam::Int(7)])
        .unwrap();
    assert_eq!(database.transaction_state().unwrap(), TransactionState::Active);

    database.commit_transaction().unwrap();
    database.rollback_transaction().unwrap();
    assert_eq!(
        database.transaction_state().unwrap(),
        TransactionState::RolledBack
    );

    let state = recorder.lock();
    assert_eq!(state.begin_calls, 1);
    assert_eq!(state.commit_calls, 1);
    assert_eq!(state.rollback_calls, 1);
}

#[test]
fn test_set_new_connection_config_reconnects() {
    let (mut database, recorder) = open();

    assert!(database.set_new_connection_config(config("d2")).unwrap());
    assert!(!database.set_new_connection_config(config("d2")).unwrap());

    let state = recorder.lock();
    assert_eq!(state.connect_calls, 2);
    assert_eq!(state.connected_with[1], config("d2"));
}

#[test]
fn test_set_new_connection_adapter_swaps_live_connection() {
    let (mut database, old) = open();
    let (adapter, new) = MockAdapter::new();

    database.set_new_connection_adapter(adapter.boxed()).unwrap();
    database.execute_query_no_returns("SELECT 1", &[]).unwrap();

    assert!(old.lock().executed.is_empty());
    assert_eq!(new.lock().connect_calls, 1);
    assert_eq!(new.lock().executed.len(), 1);
}

#[test]
fn test_set_new_connection_manager() {
    let (mut database, old) = open();
    let (adapter, new) = MockAdapter::new();
    let mut manager = SingleConnectionManager::new(adapter.boxed(), config("other")).unwrap();
    manager.initialize_new_connection().unwrap();

    database.set_new_connection_manager(Box::new(manager));
    database.execute_query_no_returns("SELECT 1", &[]).unwrap();

    // dropping the outgoing manager closed its connection
    assert!(!old.lock().active);
    assert_eq!(new.lock().executed.len(), 1);
    assert_eq!(database.connection_config().unwrap(), &config("other"));
}

#[test]
fn test_set_new_transaction_manager_is_primed() {
    let (mut database, recorder) = open();
    database.change_query_param_placeholder("$").unwrap();

    database
        .set_new_transaction_manager(Box::new(DefaultTransactionManager::new()))
        .unwrap();
    assert_eq!(
        database.transaction_state().unwrap(),
        TransactionState::Initialized
    );

    database.begin_transaction().unwrap();
    database.execute_in_transaction("SELECT $", &[QueryParam::Null]).unwrap();
    assert_eq!(recorder.lock().placeholders, vec!["$".to_string()]);
}

#[test]
fn test_deconstruct_releases_components() {
    let (mut database, recorder) = open();

    database.deconstruct_database_and_components().unwrap();
    assert!(!recorder.lock().active);
    assert_eq!(recorder.lock().close_calls, 1);

    assert!(matches!(
        database.execute_query_returns_all("SELECT 1", &[]),
        Err(DbError::NullObjectOperation { .. })
    ));
    assert!(matches!(
        database.commit_transaction(),
        Err(DbError::NullObjectOperation { .. })
    ));

    // a second teardown, and the one on drop, are harmless
    database.deconstruct_database_and_components().unwrap();
    drop(database);
    assert_eq!(recorder.lock().close_calls, 1);
}

#[test]
fn test_drop_closes_connection() {
    let (database, recorder) = open();
    drop(database);
    assert!(!recorder.lock().active);
}

#[test]
fn test_batch_execution() {
    let (mut database, recorder) = open();
    let rows = vec![
        vec![QueryParam::Int(1), QueryParam::from("a")],
        vec![QueryParam::Int(2), QueryParam::from("b")],
    ];

    let affected = database
        .execute_query_batch("INSERT INTO t VALUES (?, ?)", &rows)
        .unwrap();
    assert_eq!(affected, Some(2));

    let state = recorder.lock();
    assert_eq!(state.executed.len(), 2);
    assert_eq!(state.cursor_closes, 1);
}
