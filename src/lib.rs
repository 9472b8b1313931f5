//! db-facade library
//!
//! A pluggable database-access layer: a facade that runs SQL over one replaceable
//! connection adapter, tracks the transaction lifecycle as a state machine, and
//! notifies logger observers around query execution. A bundled sqlx adapter covers
//! SQLite, PostgreSQL and MySQL.

pub mod config;
pub mod database;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod os;

pub use config::Config;
pub use database::{Database, QueryInterface, SingleConnectionDatabase};
pub use error::{DbError, DbResult};
