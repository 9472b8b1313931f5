//! Observer registry for log entries.

use super::entry::{LogEntry, LogLevel};
use std::sync::Arc;

/// Receiver of log entries.
pub trait LoggerObserver: Send + Sync {
    fn update(&self, log_entry: &LogEntry);
}

/// Something observers can subscribe to.
///
/// Observers are compared by identity (`Arc::ptr_eq`), never by value.
pub trait LoggerSubject {
    /// Returns `false` if this observer is already registered.
    fn register_logger_observer(&mut self, observer: Arc<dyn LoggerObserver>) -> bool;

    /// Returns `false` if the observer was not registered.
    fn remove_logger_observer(&mut self, observer: &Arc<dyn LoggerObserver>) -> bool;

    /// Call `update` on every observer in registration order.
    /// Returns `false` when nobody is registered.
    fn notify_logger_observers(&self, log_entry: &LogEntry) -> bool;
}

/// Ordered list of registered observers.
#[derive(Default, Clone)]
pub struct LoggerObservers {
    observers: Vec<Arc<dyn LoggerObserver>>,
}

impl std::fmt::Debug for LoggerObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerObservers")
            .field("count", &self.observers.len())
            .finish()
    }
}

impl LoggerObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn contains(&self, observer: &Arc<dyn LoggerObserver>) -> bool {
        self.observers.iter().any(|o| Arc::ptr_eq(o, observer))
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl LoggerSubject for LoggerObservers {
    fn register_logger_observer(&mut self, observer: Arc<dyn LoggerObserver>) -> bool {
        if self.contains(&observer) {
            return false;
        }
        self.observers.push(observer);
        true
    }

    fn remove_logger_observer(&mut self, observer: &Arc<dyn LoggerObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
        self.observers.len() != before
    }

    fn notify_logger_observers(&self, log_entry: &LogEntry) -> bool {
        if self.observers.is_empty() {
            return false;
        }
        for observer in &self.observers {
            observer.update(log_entry);
        }
        true
    }
}

/// Forwards log entries to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LoggerObserver for TracingObserver {
    fn update(&self, log_entry: &LogEntry) {
        let context = log_entry.context();
        let message = log_entry.message_text();
        let created_at = log_entry.created_at();
        match log_entry.level() {
            LogLevel::Trace => tracing::trace!(context, created_at = %created_at, "{message}"),
            LogLevel::Debug => tracing::debug!(context, created_at = %created_at, "{message}"),
            LogLevel::Info => tracing::info!(context, created_at = %created_at, "{message}"),
            LogLevel::Warning => tracing::warn!(context, created_at = %created_at, "{message}"),
            LogLevel::Error => tracing::error!(context, created_at = %created_at, "{message}"),
            LogLevel::Critical => {
                tracing::error!(context, created_at = %created_at, critical = true, "{message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl LoggerObserver for Recorder {
        fn update(&self, log_entry: &LogEntry) {
            self.seen.lock().push(log_entry.message_text().to_string());
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut subject = LoggerObservers::new();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn LoggerObserver> = recorder.clone();

        assert!(subject.register_logger_observer(observer.clone()));
        assert!(!subject.register_logger_observer(observer.clone()));
        assert_eq!(subject.len(), 1);

        assert!(subject.notify_logger_observers(&LogEntry::new(LogLevel::Info, "hi", "test")));
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[test]
    fn test_remove_and_notify_empty() {
        let mut subject = LoggerObservers::new();
        let observer: Arc<dyn LoggerObserver> = Arc::new(TracingObserver);

        assert!(!subject.remove_logger_observer(&observer));
        subject.register_logger_observer(observer.clone());
        assert!(subject.remove_logger_observer(&observer));
        assert!(subject.is_empty());
        assert!(!subject.notify_logger_observers(&LogEntry::new(LogLevel::Debug, "x", "y")));
    }
}
