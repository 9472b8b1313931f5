//! File logger settings.

use crate::error::{DbError, DbResult};
use std::path::{Path, PathBuf};

/// Default line layout. `{created_at}`, `{level}`, `{context}` and `{message}` are substituted.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "{created_at} [{level}] {context}: {message}";

/// Default size at which a log file is overwritten instead of appended to (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// How the logger opens its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// Never write
    Read,
    Overwrite,
    #[default]
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoggerSettings {
    pub file_path: PathBuf,
    pub message_template: String,
    pub file_mode: FileMode,
    pub max_file_size_bytes: u64,
}

impl FileLoggerSettings {
    /// Append-mode settings with the default template and size limit.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            file_mode: FileMode::Append,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    pub fn with_file_mode(mut self, file_mode: FileMode) -> Self {
        self.file_mode = file_mode;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size_bytes: u64) -> Self {
        self.max_file_size_bytes = max_file_size_bytes;
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Logger configuration, or its absence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoggerConfig {
    File(FileLoggerSettings),
    #[default]
    Null,
}

impl LoggerConfig {
    pub fn settings(&self) -> DbResult<&FileLoggerSettings> {
        match self {
            Self::File(settings) => Ok(settings),
            Self::Null => Err(DbError::null_object("LoggerConfig::settings")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
