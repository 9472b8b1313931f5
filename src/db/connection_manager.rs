//! Connection lifecycle management.
//!
//! A connection manager owns exactly one adapter plus the config it connects with,
//! and decides when that connection is (re)established. The adapter sits behind a
//! `SharedConnection` whose contents are swapped in place, so handles given out by
//! `get_connection` stay valid across adapter replacement.

use crate::db::adapter::{ConnectionAdapter, SharedConnection, share_adapter};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionConfig;
use tracing::{debug, info, warn};

/// Contract for owning and reviving the single live connection.
pub trait ConnectionManager: Send {
    /// Current connection after a liveness check; a failed ping triggers one
    /// `reinitialize_connection` before the handle is returned.
    fn get_connection(&mut self) -> DbResult<SharedConnection>;

    /// Close any active connection, then connect with the stored config.
    fn initialize_new_connection(&mut self) -> DbResult<bool>;

    /// Cheap `reconnect` when the adapter is active, full initialization otherwise.
    fn reinitialize_connection(&mut self) -> DbResult<bool>;

    /// Replace the adapter. An active outgoing connection is closed and the new
    /// adapter connected with the current config.
    fn set_new_adapter(&mut self, adapter: Box<dyn ConnectionAdapter>) -> DbResult<()>;

    /// Replace the config. Returns `false` when it equals the current one.
    fn set_new_config(&mut self, config: ConnectionConfig) -> DbResult<bool>;

    /// `true` only if the adapter is active and answers a ping.
    fn check_connection_status(&mut self) -> DbResult<bool>;

    fn config(&self) -> DbResult<&ConnectionConfig>;

    /// Close the connection if it is active.
    fn close_connection(&mut self) -> DbResult<bool>;
}

pub struct SingleConnectionManager {
    connection: SharedConnection,
    config: ConnectionConfig,
}

impl std::fmt::Debug for SingleConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleConnectionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SingleConnectionManager {
    /// Create a manager without connecting.
    pub fn new(adapter: Box<dyn ConnectionAdapter>, config: ConnectionConfig) -> DbResult<Self> {
        config.validate()?;
        Ok(Self {
            connection: share_adapter(adapter),
            config,
        })
    }
}

impl ConnectionManager for SingleConnectionManager {
    fn get_connection(&mut self) -> DbResult<SharedConnection> {
        let alive = self.connection.lock().ping();
        if !alive {
            debug!("Ping failed, reinitializing connection");
            self.reinitialize_connection()?;
        }
        Ok(SharedConnection::clone(&self.connection))
    }

    fn initialize_new_connection(&mut self) -> DbResult<bool> {
        let mut adapter = self.connection.lock();
        if adapter.is_active() {
            debug!("Closing active connection before initialization");
            adapter.close();
        }

        let connected = adapter.connect(&self.config);
        if connected {
            info!(db_type = ?self.config.database_type(), "Connection initialized");
        } else {
            warn!(config = ?self.config, "Connection initialization failed");
        }
        Ok(connected)
    }

    fn reinitialize_connection(&mut self) -> DbResult<bool> {
        let reconnected = {
            let mut adapter = self.connection.lock();
            adapter.is_active().then(|| adapter.reconnect())
        };

        match reconnected {
            Some(true) => {
                debug!("Connection re-established");
                Ok(true)
            }
            Some(false) => {
                warn!("Reconnect failed");
                Ok(false)
            }
            None => self.initialize_new_connection(),
        }
    }

    fn set_new_adapter(&mut self, adapter: Box<dyn ConnectionAdapter>) -> DbResult<()> {
        let was_active = {
            let mut current = self.connection.lock();
            let was_active = current.is_active();
            if was_active {
                current.close();
            }
            *current = adapter;
            was_active
        };

        info!(reconnect = was_active, "Connection adapter replaced");
        if was_active {
            self.initialize_new_connection()?;
        }
        Ok(())
    }

    fn set_new_config(&mut self, config: ConnectionConfig) -> DbResult<bool> {
        config.validate()?;
        if config == self.config {
            debug!("Connection config unchanged");
            return Ok(false);
        }

        self.config = config;
        let active = self.connection.lock().is_active();
        info!(reconnect = active, "Connection config replaced");
        if active {
            self.initialize_new_connection()?;
        }
        Ok(true)
    }

    fn check_connection_status(&mut self) -> DbResult<bool> {
        let mut adapter = self.connection.lock();
        Ok(adapter.is_active() && adapter.ping())
    }

    fn config(&self) -> DbResult<&ConnectionConfig> {
        Ok(&self.config)
    }

    fn close_connection(&mut self) -> DbResult<bool> {
        let mut adapter = self.connection.lock();
        if !adapter.is_active() {
            return Ok(false);
        }
        Ok(adapter.close())
    }
}

impl Drop for SingleConnectionManager {
    fn drop(&mut self) {
        let mut adapter = self.connection.lock();
        if adapter.is_active() {
            debug!("Closing connection on manager drop");
            adapter.close();
        }
    }
}

/// Stand-in used before a real connection manager is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConnectionManager;

impl ConnectionManager for NullConnectionManager {
    fn get_connection(&mut self) -> DbResult<SharedConnection> {
        Err(DbError::null_object("ConnectionManager::get_connection"))
    }

    fn initialize_new_connection(&mut self) -> DbResult<bool> {
        Err(DbError::null_object(
            "ConnectionManager::initialize_new_connection",
        ))
    }

    fn reinitialize_connection(&mut self) -> DbResult<bool> {
        Err(DbError::null_object(
            "ConnectionManager::reinitialize_connection",
        ))
    }

    fn set_new_adapter(&mut self, _adapter: Box<dyn ConnectionAdapter>) -> DbResult<()> {
        Err(DbError::null_object("ConnectionManager::set_new_adapter"))
    }

    fn set_new_config(&mut self, _config: ConnectionConfig) -> DbResult<bool> {
        Err(DbError::null_object("ConnectionManager::set_new_config"))
    }

    fn check_connection_status(&mut self) -> DbResult<bool> {
        Err(DbError::null_object(
            "ConnectionManager::check_connection_status",
        ))
    }

    fn config(&self) -> DbResult<&ConnectionConfig> {
        Err(DbError::null_object("ConnectionManager::config"))
    }

    fn close_connection(&mut self) -> DbResult<bool> {
        Err(DbError::null_object("ConnectionManager::close_connection"))
    }
}
