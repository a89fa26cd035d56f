//! JSON-file-backed account directory.
//!
//! Stand-in for the external account store: a single JSON document of
//! accounts plus an append-only JSONL audit log. The relational store this
//! fronts for is outside this workspace's scope; the core only ever talks to
//! the [`AccountDirectory`] trait.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panel_types::{Account, AccountDirectory, AccountId, DirectoryError, SessionMirror};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub struct JsonAccountDirectory {
    accounts_file: PathBuf,
    audit_log: PathBuf,
    accounts: Mutex<Vec<Account>>,
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    at: DateTime<Utc>,
    account_id: &'a AccountId,
    kind: &'a str,
    success: bool,
    detail: &'a str,
}

impl JsonAccountDirectory {
    pub fn open(accounts_file: PathBuf, audit_log: PathBuf) -> Result<Self, DirectoryError> {
        let accounts = match std::fs::read(&accounts_file) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                DirectoryError::Storage(format!("parse {}: {e}", accounts_file.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(DirectoryError::Storage(format!(
                    "read {}: {e}",
                    accounts_file.display()
                )));
            }
        };
        Ok(Self {
            accounts_file,
            audit_log,
            accounts: Mutex::new(accounts),
        })
    }

    fn snapshot(&self) -> Vec<Account> {
        self.accounts.lock().clone()
    }

    async fn persist(&self, accounts: &[Account]) -> Result<(), DirectoryError> {
        if let Some(parent) = self.accounts_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DirectoryError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let raw = serde_json::to_vec_pretty(accounts)
            .map_err(|e| DirectoryError::Storage(format!("encode accounts: {e}")))?;
        tokio::fs::write(&self.accounts_file, raw)
            .await
            .map_err(|e| {
                DirectoryError::Storage(format!("write {}: {e}", self.accounts_file.display()))
            })
    }

    /// Apply `mutate` to the account and persist the whole document.
    async fn update_account<F>(&self, id: &AccountId, mutate: F) -> Result<(), DirectoryError>
    where
        F: FnOnce(&mut Account),
    {
        let updated = {
            let mut accounts = self.accounts.lock();
            let account = accounts
                .iter_mut()
                .find(|a| &a.id == id)
                .ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
            mutate(account);
            accounts.clone()
        };
        self.persist(&updated).await
    }
}

#[async_trait]
impl AccountDirectory for JsonAccountDirectory {
    async fn get_account(&self, id: &AccountId) -> Result<Account, DirectoryError> {
        self.accounts
            .lock()
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))
    }

    async fn accounts_in_group(
        &self,
        group: Option<&str>,
    ) -> Result<Vec<Account>, DirectoryError> {
        let accounts = self.snapshot();
        Ok(match group {
            Some(group) => accounts
                .into_iter()
                .filter(|a| a.group.as_deref() == Some(group))
                .collect(),
            None => accounts,
        })
    }

    async fn update_session_mirror(
        &self,
        id: &AccountId,
        mirror: SessionMirror,
    ) -> Result<(), DirectoryError> {
        self.update_account(id, |account| {
            account.has_session = mirror.active;
            account.session_expires_at = mirror.expires_at;
        })
        .await
    }

    async fn touch_last_used(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        self.update_account(id, |account| {
            account.last_used_at = Some(at);
        })
        .await
    }

    async fn record_event(
        &self,
        id: &AccountId,
        kind: &str,
        success: bool,
        detail: &str,
    ) -> Result<(), DirectoryError> {
        let record = AuditRecord {
            at: Utc::now(),
            account_id: id,
            kind,
            success,
            detail,
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| DirectoryError::Storage(format!("encode audit record: {e}")))?;
        line.push('\n');

        if let Some(parent) = self.audit_log.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!(error = %e, "Failed to create audit log directory");
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log)
            .await
            .map_err(|e| {
                DirectoryError::Storage(format!("open {}: {e}", self.audit_log.display()))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            DirectoryError::Storage(format!("append {}: {e}", self.audit_log.display()))
        })
    }
}
