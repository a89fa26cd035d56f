use chrono::{DateTime, Utc};
use panel_types::{AccountId, AuthArtifact, PanelKind};
use serde::{Deserialize, Serialize};

/// Cache key: one live session per (account, panel kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub account: AccountId,
    pub panel: PanelKind,
}

impl SessionKey {
    pub fn new(account: &AccountId, panel: PanelKind) -> Self {
        Self {
            account: account.clone(),
            panel,
        }
    }

    /// Stable storage name; account ids are sanitized to filesystem-safe
    /// characters.
    pub fn storage_name(&self) -> String {
        let safe: String = self
            .account
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        format!("account_{safe}_{}", self.panel)
    }

    /// Lock-map key for per-key serialization of resolves.
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.account, self.panel)
    }
}

/// One persisted authentication session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub account_id: AccountId,
    pub panel: PanelKind,
    /// Opaque to the cache; only the matching adapter interprets it.
    pub artifact: AuthArtifact,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.account_id, self.panel)
    }

    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whole hours left before expiry, floored at zero.
    pub fn hours_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_hours().max(0)
    }
}
