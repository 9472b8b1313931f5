//! Log entry construction.

use super::entry::{LogEntry, LogLevel};
use crate::error::DbResult;

/// Stateless builder for `LogEntry` values.
///
/// Holds no state, so one instance (typically behind an `Arc`) can be shared by any
/// number of facades.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEntryFactory;

impl LogEntryFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build an entry from a level name such as `"Info"` or `"error"`.
    pub fn create_new_log_entry(
        &self,
        level: &str,
        message_text: impl Into<String>,
        context: impl Into<String>,
    ) -> DbResult<LogEntry> {
        let level: LogLevel = level.parse()?;
        Ok(self.create(level, message_text, context))
    }

    pub fn create(
        &self,
        level: LogLevel,
        message_text: impl Into<String>,
        context: impl Into<String>,
    ) -> LogEntry {
        LogEntry::new(level, message_text, context)
    }
}
