//! File-backed logger observer.

use super::config::{FileMode, LoggerConfig};
use super::entry::LogEntry;
use super::subject::LoggerObserver;
use crate::error::DbResult;
use crate::os::file_explorer::{FileExplorer, NullFileExplorer};
use std::collections::BTreeMap;
use tracing::warn;

/// Writes log entries to a file through a `FileExplorer`.
///
/// Starts with the null config and the null explorer, so it must be configured
/// before `process_log_msg` can succeed.
pub struct FileLogger {
    config: LoggerConfig,
    file_explorer: Box<dyn FileExplorer>,
}

impl std::fmt::Debug for FileLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for FileLogger {
    fn default() -> Self {
        Self {
            config: LoggerConfig::Null,
            file_explorer: Box::new(NullFileExplorer),
        }
    }
}

impl FileLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(config: LoggerConfig, file_explorer: Box<dyn FileExplorer>) -> Self {
        Self {
            config,
            file_explorer,
        }
    }

    pub fn logger_config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn set_new_config(&mut self, config: LoggerConfig) {
        self.config = config;
    }

    pub fn set_new_file_explorer(&mut self, file_explorer: Box<dyn FileExplorer>) {
        self.file_explorer = file_explorer;
    }

    /// Format and write one entry. Returns `false` when the file mode forbids writing.
    pub fn process_log_msg(&self, log_entry: &LogEntry) -> DbResult<bool> {
        let data = self.read_log_entry(log_entry);
        self.flush_log_msg(&data)
    }

    fn read_log_entry(&self, log_entry: &LogEntry) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("created_at", log_entry.created_at().to_rfc3339()),
            ("level", log_entry.level().to_string()),
            ("context", log_entry.context().to_string()),
            ("message", log_entry.message_text().to_string()),
        ])
    }

    fn flush_log_msg(&self, data: &BTreeMap<&'static str, String>) -> DbResult<bool> {
        let settings = self.config.settings()?;
        let mut line = render_template(&settings.message_template, data);
        line.push('\n');

        let path = settings.file_path();
        match settings.file_mode {
            FileMode::Read => Ok(false),
            FileMode::Overwrite => self.file_explorer.overwrite_file(path, &line),
            FileMode::Append => {
                let size = self.file_explorer.file_size(path)?;
                if size + line.len() as u64 > settings.max_file_size_bytes {
                    self.file_explorer.overwrite_file(path, &line)
                } else {
                    self.file_explorer.append_to_file(path, &line)
                }
            }
        }
    }
}

impl LoggerObserver for FileLogger {
    fn update(&self, log_entry: &LogEntry) {
        if let Err(e) = self.process_log_msg(log_entry) {
            warn!(error = %e, "File logger failed to write entry");
        }
    }
}

/// Substitute `{name}` fields in one pass; unknown fields are left as written.
fn render_template(template: &str, data: &BTreeMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find('}').and_then(|end| data.get(&tail[1..end]).map(|v| (end, v))) {
            Some((end, value)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
