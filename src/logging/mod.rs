//! Domain logging.
//!
//! The facade builds `LogEntry` values through a shared `LogEntryFactory` and hands
//! them to registered `LoggerObserver`s. This is independent of the crate's own
//! `tracing` diagnostics; `TracingObserver` bridges the two.

pub mod config;
pub mod entry;
pub mod factory;
pub mod logger;
pub mod subject;

pub use config::{FileLoggerSettings, FileMode, LoggerConfig};
pub use entry::{LogEntry, LogLevel};
pub use factory::LogEntryFactory;
pub use logger::FileLogger;
pub use subject::{LoggerObserver, LoggerObservers, LoggerSubject, TracingObserver};
