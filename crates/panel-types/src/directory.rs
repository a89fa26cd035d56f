//! Boundary trait for the external account store.
//!
//! The relational storage of accounts, groups, and the audit log lives
//! outside this workspace's core; the core only needs to look accounts up,
//! mirror session state onto them, and append audit events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Account, AccountId};

/// Errors surfaced by an account directory implementation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("account not found: {0}")]
    NotFound(AccountId),
    #[error("directory storage error: {0}")]
    Storage(String),
}

/// Session-state mirror written onto an account record.
///
/// `active == false` always comes with `expires_at == None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMirror {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionMirror {
    pub fn active_until(expires_at: DateTime<Utc>) -> Self {
        Self {
            active: true,
            expires_at: Some(expires_at),
        }
    }

    pub fn cleared() -> Self {
        Self {
            active: false,
            expires_at: None,
        }
    }
}

/// External account store, as seen from the core.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_account(&self, id: &AccountId) -> Result<Account, DirectoryError>;

    /// Accounts belonging to a group, in stable order. `None` lists all.
    async fn accounts_in_group(&self, group: Option<&str>)
    -> Result<Vec<Account>, DirectoryError>;

    /// Synchronously reflect a session lifecycle change onto the account.
    async fn update_session_mirror(
        &self,
        id: &AccountId,
        mirror: SessionMirror,
    ) -> Result<(), DirectoryError>;

    /// Update the account's last-used timestamp.
    async fn touch_last_used(&self, id: &AccountId, at: DateTime<Utc>)
    -> Result<(), DirectoryError>;

    /// Append-only audit record. Failures here must never abort the caller's
    /// operation; implementations log and move on.
    async fn record_event(
        &self,
        id: &AccountId,
        kind: &str,
        success: bool,
        detail: &str,
    ) -> Result<(), DirectoryError>;
}
