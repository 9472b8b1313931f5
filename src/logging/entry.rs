//! Log entries emitted by the facade.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Critical,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Debug,
        Self::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DbError::unsupported_log_level(s))
    }
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    level: LogLevel,
    message_text: String,
    context: String,
    created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(level: LogLevel, message_text: impl Into<String>, context: impl Into<String>) -> Self {
        Self::at(level, message_text, context, Utc::now())
    }

    pub fn at(
        level: LogLevel,
        message_text: impl Into<String>,
        context: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            level,
            message_text: message_text.into(),
            context: context.into(),
            created_at,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message_text(&self) -> &str {
        &self.message_text
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
