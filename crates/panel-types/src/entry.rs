use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-native playlist entry identifier.
///
/// The panels disagree on the shape: two use opaque strings, one uses
/// numeric ids. Edit/delete calls must echo the id back in its native form,
/// so the union is preserved instead of stringifying everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Text(String),
    Numeric(i64),
}

impl EntryId {
    pub fn text(id: impl Into<String>) -> Self {
        Self::Text(id.into())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Numeric(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for EntryId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One playlist record as seen through a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: EntryId,
    pub name: String,
    /// Always begins with `http://` or `https://`.
    pub url: String,
    /// Content-type tag; panels that omit it default to "general".
    pub kind: String,
    pub protected: bool,
    pub pin: String,
}

/// Fields for creating or replacing a playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub name: String,
    pub url: String,
    pub kind: String,
    pub protected: bool,
    pub pin: String,
}

impl EntryDraft {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: "general".into(),
            protected: false,
            pin: String::new(),
        }
    }
}

impl From<&PlaylistEntry> for EntryDraft {
    fn from(entry: &PlaylistEntry) -> Self {
        Self {
            name: entry.name.clone(),
            url: entry.url.clone(),
            kind: entry.kind.clone(),
            protected: entry.protected,
            pin: entry.pin.clone(),
        }
    }
}
