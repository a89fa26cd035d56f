use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of supported panel protocols.
///
/// Each kind has a bespoke authentication scheme; there is deliberately no
/// open registration mechanism for additional panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    /// Captcha-gated login, cookie sessions.
    Orbit,
    /// Derived-token headers on every request, bearer-token sessions.
    Astra,
    /// Relay-proxied form login, single-cookie sessions.
    Vela,
}

impl PanelKind {
    pub const ALL: [PanelKind; 3] = [PanelKind::Orbit, PanelKind::Astra, PanelKind::Vela];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orbit => "orbit",
            Self::Astra => "astra",
            Self::Vela => "vela",
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelKind {
    type Err = UnknownPanel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orbit" => Ok(Self::Orbit),
            "astra" => Ok(Self::Astra),
            "vela" => Ok(Self::Vela),
            other => Err(UnknownPanel(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized panel name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown panel kind: {0}")]
pub struct UnknownPanel(pub String);
