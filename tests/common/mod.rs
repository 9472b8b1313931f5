//! Shared test fixtures: a scripted connection adapter that records every call.

#![allow(dead_code)]

use db_facade::db::{ConnectionAdapter, Cursor, IsolationLevel};
use db_facade::error::{DbError, DbResult};
use db_facade::models::{ConnectionConfig, QueryParam, Row};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;

/// Everything the mock adapter saw, plus switches controlling its answers.
#[derive(Debug)]
pub struct AdapterState {
    // switches
    pub active: bool,
    pub ping_ok: bool,
    pub connect_ok: bool,
    pub reconnect_ok: bool,
    pub begin_ok: bool,
    pub commit_ok: bool,
    pub fail_execute: bool,
    pub transaction_lost: bool,
    pub rows: Vec<Row>,

    // counters
    pub connect_calls: usize,
    pub reconnect_calls: usize,
    pub close_calls: usize,
    pub ping_calls: usize,
    pub begin_calls: usize,
    pub commit_calls: usize,
    pub rollback_calls: usize,
    pub cursor_calls: usize,
    pub cursor_closes: usize,

    // recordings
    pub connected_with: Vec<ConnectionConfig>,
    pub executed: Vec<(String, Vec<QueryParam>)>,
    pub placeholders: Vec<String>,
    pub isolation_levels: Vec<Option<IsolationLevel>>,
}

impl Default for AdapterState {
    fn default() -> Self {
        Self {
            active: false,
            ping_ok: true,
            connect_ok: true,
            reconnect_ok: true,
            begin_ok: true,
            commit_ok: true,
            fail_execute: false,
            transaction_lost: false,
            rows: Vec::new(),
            connect_calls: 0,
            reconnect_calls: 0,
            close_calls: 0,
            ping_calls: 0,
            begin_calls: 0,
            commit_calls: 0,
            rollback_calls: 0,
            cursor_calls: 0,
            cursor_closes: 0,
            connected_with: Vec::new(),
            executed: Vec::new(),
            placeholders: Vec::new(),
            isolation_levels: Vec::new(),
        }
    }
}

pub type Recorder = Arc<Mutex<AdapterState>>;

#[derive(Debug)]
pub struct MockAdapter {
    state: Recorder,
}

impl MockAdapter {
    /// A disconnected adapter and the recorder observing it.
    pub fn new() -> (Self, Recorder) {
        let state = Recorder::default();
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }

    /// An adapter that already reports an open connection.
    pub fn connected() -> (Self, Recorder) {
        let (adapter, recorder) = Self::new();
        recorder.lock().active = true;
        (adapter, recorder)
    }

    pub fn boxed(self) -> Box<dyn ConnectionAdapter> {
        Box::new(self)
    }
}

impl ConnectionAdapter for MockAdapter {
    fn connect(&mut self, config: &ConnectionConfig) -> bool {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        state.connected_with.push(config.clone());
        state.active = state.connect_ok;
        state.connect_ok
    }

    fn reconnect(&mut self) -> bool {
        let mut state = self.state.lock();
        state.reconnect_calls += 1;
        state.active = state.reconnect_ok;
        state.reconnect_ok
    }

    fn get_cursor(&mut self, placeholder: &str) -> DbResult<Box<dyn Cursor + '_>> {
        let mut state = self.state.lock();
        if !state.active {
            return Err(DbError::ConnectionNotActive);
        }
        state.cursor_calls += 1;
        state.placeholders.push(placeholder.to_string());
        Ok(Box::new(MockCursor {
            state: Arc::clone(&self.state),
            buffer: VecDeque::new(),
            rowcount: None,
        }))
    }

    fn commit(&mut self) -> bool {
        let mut state = self.state.lock();
        state.commit_calls += 1;
        state.commit_ok
    }

    fn rollback(&mut self) -> bool {
        self.state.lock().rollback_calls += 1;
        true
    }

    fn close(&mut self) -> bool {
        let mut state = self.state.lock();
        state.close_calls += 1;
        std::mem::replace(&mut state.active, false)
    }

    fn is_active(&self) -> bool {
        self.state.lock().active
    }

    fn ping(&mut self) -> bool {
        let mut state = self.state.lock();
        state.ping_calls += 1;
        state.active && state.ping_ok
    }

    fn begin_transaction(&mut self, isolation_level: Option<IsolationLevel>) -> bool {
        let mut state = self.state.lock();
        state.begin_calls += 1;
        state.isolation_levels.push(isolation_level);
        state.transaction_lost = false;
        state.begin_ok
    }

    fn transaction_intact(&self) -> bool {
        !self.state.lock().transaction_lost
    }
}

pub struct MockCursor {
    state: Recorder,
    buffer: VecDeque<Row>,
    rowcount: Option<u64>,
}

impl Cursor for MockCursor {
    fn execute(&mut self, query: &str, params: &[QueryParam]) -> DbResult<()> {
        let mut state = self.state.lock();
        if state.fail_execute {
            return Err(DbError::database("scripted failure", None, "none"));
        }
        state.executed.push((query.to_string(), params.to_vec()));
        self.buffer = state.rows.iter().cloned().collect();
        self.rowcount = Some(state.rows.len() as u64);
        Ok(())
    }

    fn executemany(&mut self, query: &str, rows: &[Vec<QueryParam>]) -> DbResult<()> {
        for params in rows {
            self.execute(query, params)?;
        }
        self.buffer.clear();
        self.rowcount = Some(rows.len() as u64);
        Ok(())
    }

    fn fetchone(&mut self) -> DbResult<Option<Row>> {
        Ok(self.buffer.pop_front())
    }

    fn fetchmany(&mut self, count: usize) -> DbResult<Vec<Row>> {
        let count = if count == 0 { 1 } else { count };
        let take = count.min(self.buffer.len());
        Ok(self.buffer.drain(..take).collect())
    }

    fn fetchall(&mut self) -> DbResult<Vec<Row>> {
        Ok(self.buffer.drain(..).collect())
    }

    fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    fn lastrowid(&self) -> Option<i64> {
        None
    }

    fn close(&mut self) -> DbResult<()> {
        self.state.lock().cursor_closes += 1;
        Ok(())
    }
}

/// Build a row from column/value pairs.
pub fn row(pairs: &[(&str, JsonValue)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn config(database: &str) -> ConnectionConfig {
    ConnectionConfig::new()
        .with("user", "root")
        .with("database", database)
}
