use serde::{Deserialize, Serialize};

use crate::PanelKind;

/// Authentication artifact produced by a successful panel login.
///
/// Opaque to the session cache, which only serializes it; each variant is
/// interpretable exclusively by the adapter of the matching panel kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum AuthArtifact {
    Orbit {
        /// Normalized panel domain the session was opened against.
        domain: String,
        /// Raw `set-cookie` values captured from the login response.
        cookies: Vec<String>,
        /// Panel-assigned device id, when the login response carried one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_id: Option<String>,
    },
    Astra {
        /// Bearer token returned by the login endpoint.
        token: String,
    },
    Vela {
        /// Single `name=value` cookie pair accepted at login.
        cookie: String,
    },
}

impl AuthArtifact {
    #[inline]
    pub fn kind(&self) -> PanelKind {
        match self {
            Self::Orbit { .. } => PanelKind::Orbit,
            Self::Astra { .. } => PanelKind::Astra,
            Self::Vela { .. } => PanelKind::Vela,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let artifact = AuthArtifact::Vela {
            cookie: "PHPSESSID=abc".into(),
        };
        assert_eq!(artifact.kind(), PanelKind::Vela);
    }

    #[test]
    fn survives_serialization() {
        let artifact = AuthArtifact::Orbit {
            domain: "panel.example.com".into(),
            cookies: vec!["sid=1; Path=/".into()],
            device_id: Some("64f".into()),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert_eq!(serde_json::from_str::<AuthArtifact>(&json).unwrap(), artifact);
    }
}
