//! Data models shared by the connection layer and the facade.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DatabaseType};
pub use query::{QueryParam, Row};
