use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PanelKind;

/// Opaque account identifier assigned by the account store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One managed device account as held by the account store.
///
/// The core reads the identity and credential fields and writes only the
/// session-state mirror (`has_session` / `session_expires_at` /
/// `last_used_at`), which the store surfaces to operators without having to
/// open the session cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Operator-facing display name.
    pub name: String,
    pub panel: PanelKind,
    /// MAC-style hardware identifier, colon-separated.
    pub mac_address: String,
    /// Per-device secret the panels issue alongside the MAC.
    pub device_key: String,
    /// Account password; only the derived-token panel uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Panel domain override for panels that are domain-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Optional grouping label ("server" in operator terms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    // Session-state mirror, owned by the session cache.
    #[serde(default)]
    pub has_session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Account {
    /// MAC with separators stripped, lowercased. Used by panels that key
    /// device URLs off the hardware identifier.
    pub fn mac_compact(&self) -> String {
        self.mac_address
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase()
    }
}
