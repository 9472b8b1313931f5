//! Database access layer.
//!
//! This module provides:
//! - Adapter and cursor contracts over one native connection
//! - Connection lifecycle management
//! - The transaction state machine
//! - A bundled sqlx adapter (MySQL, PostgreSQL, SQLite) with its parameter
//!   binding, row decoding and placeholder rewriting

pub mod adapter;
pub mod connection_manager;
#[macro_use]
pub mod macros;
pub mod params;
pub mod placeholder;
pub mod sqlx_adapter;
pub mod transaction;
pub mod types;

pub use adapter::{ConnectionAdapter, Cursor, DEFAULT_ARRAY_SIZE, SharedConnection, share_adapter};
pub use connection_manager::{ConnectionManager, NullConnectionManager, SingleConnectionManager};
pub use placeholder::{PlaceholderStyle, rewrite_placeholders, validate_placeholder};
pub use sqlx_adapter::{NativeConnection, SqlxAdapter};
pub use transaction::{
    DefaultTransactionManager, IsolationLevel, NullTransactionManager, TransactionManager,
    TransactionState,
};
