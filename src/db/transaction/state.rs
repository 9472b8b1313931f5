//! Transaction lifecycle states.
//!
//! Each state owns only the operation that moves a transaction forward. An operation
//! meant for a later phase transitions first, then re-invokes itself through the
//! manager, so it lands on the new state's handler.

use super::DefaultTransactionManager;
use crate::error::DbResult;
use crate::models::{QueryParam, Row};
use tracing::debug;

/// Phase of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionState {
    #[default]
    Initialized,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }

    pub(super) fn begin(self, ctx: &mut DefaultTransactionManager) -> DbResult<()> {
        match self {
            Self::Initialized => ctx.ensure_connection_live(),
            Self::RolledBack => {
                ctx.transition_to(Self::Initialized)?;
                ctx.begin_in_current_state()
            }
            Self::Active | Self::Committed => {
                debug!(state = %self, "begin ignored");
                Ok(())
            }
        }
    }

    pub(super) fn execute(
        self,
        ctx: &mut DefaultTransactionManager,
        query: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        match self {
            Self::Initialized => {
                ctx.transition_to(Self::Active)?;
                ctx.execute_in_current_state(query, params)
            }
            Self::Active => ctx.run_statement(query, params),
            Self::Committed | Self::RolledBack => {
                debug!(state = %self, "execute ignored outside an active transaction");
                Ok(Vec::new())
            }
        }
    }

    pub(super) fn commit(self, ctx: &mut DefaultTransactionManager) -> DbResult<()> {
        match self {
            Self::Active => {
                ctx.transition_to(Self::Committed)?;
                ctx.commit_in_current_state()
            }
            Self::Committed => {
                debug!("Transaction already committed");
                Ok(())
            }
            Self::Initialized | Self::RolledBack => {
                debug!(state = %self, "commit ignored");
                Ok(())
            }
        }
    }

    pub(super) fn rollback(self, ctx: &mut DefaultTransactionManager) -> DbResult<()> {
        match self {
            Self::Committed => {
                ctx.transition_to(Self::RolledBack)?;
                ctx.rollback_in_current_state()
            }
            Self::RolledBack => {
                debug!("Transaction already rolled back");
                Ok(())
            }
            Self::Initialized | Self::Active => {
                debug!(state = %self, "rollback ignored");
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
