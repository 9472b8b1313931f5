//! Backend dispatch macros for the sqlx adapter.
//!
//! sqlx connections of different backends share method names but not a type, so
//! calls that read the same for every backend are written once and expanded per
//! variant at compile time.

/// Run the same expression against whichever native connection is held.
///
/// # Example
///
/// ```ignore
/// let ok = native_dispatch!(&mut connection, conn => conn.ping().await.is_ok());
/// ```
#[macro_export]
macro_rules! native_dispatch {
    ($connection:expr, $conn:ident => $body:expr) => {
        match $connection {
            $crate::db::sqlx_adapter::NativeConnection::MySql($conn) => $body,
            $crate::db::sqlx_adapter::NativeConnection::Postgres($conn) => $body,
            $crate::db::sqlx_adapter::NativeConnection::SQLite($conn) => $body,
        }
    };
}

pub use native_dispatch;
