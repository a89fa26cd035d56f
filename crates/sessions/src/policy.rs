//! Per-kind session expiry and liveness policies.

use chrono::Duration;
use panel_types::PanelKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub ttl_hours: i64,
    /// Probe the panel with the cached artifact before reusing it.
    pub probe_before_use: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl_hours: 72,
            probe_before_use: true,
        }
    }
}

impl SessionPolicy {
    pub const fn hours(ttl_hours: i64) -> Self {
        Self {
            ttl_hours,
            probe_before_use: true,
        }
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        Duration::hours(self.ttl_hours)
    }
}

/// The three independent per-kind policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicies {
    pub orbit: SessionPolicy,
    pub astra: SessionPolicy,
    pub vela: SessionPolicy,
}

impl Default for SessionPolicies {
    fn default() -> Self {
        Self {
            orbit: SessionPolicy::hours(72),
            astra: SessionPolicy::hours(168),
            vela: SessionPolicy::hours(72),
        }
    }
}

impl SessionPolicies {
    pub fn for_kind(&self, kind: PanelKind) -> &SessionPolicy {
        match kind {
            PanelKind::Orbit => &self.orbit,
            PanelKind::Astra => &self.astra,
            PanelKind::Vela => &self.vela,
        }
    }
}
