//! Session lifecycle events.
//!
//! Every transition the cache makes is distinguishable for the audit trail:
//! the event kind goes into the account directory's append-only log and into
//! the tracing stream.

use panels_api::PanelError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// First login for a key with no cached session.
    FreshLogin,
    /// Cached session hit its expiry and was replaced.
    ExpiredRenewal,
    /// Cached session failed the liveness probe and was replaced.
    ProbeRenewal,
    /// Cached session reused as-is.
    Reused { hours_left: i64 },
    /// Session deleted on request (credential change, operator action).
    Invalidated,
    /// Session deleted by the periodic expiry sweep.
    Swept,
    /// Login attempt failed.
    LoginFailed { fatal: bool },
}

impl SessionEvent {
    pub fn login_failed(err: &PanelError) -> Self {
        Self::LoginFailed { fatal: err.is_fatal() }
    }

    /// Audit-record kind string.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::FreshLogin | Self::ExpiredRenewal | Self::ProbeRenewal | Self::LoginFailed { .. } => {
                "login"
            }
            Self::Reused { .. } => "session_reused",
            Self::Invalidated => "session_invalidated",
            Self::Swept => "session_swept",
        }
    }

    pub fn success(&self) -> bool {
        !matches!(self, Self::LoginFailed { .. })
    }

    pub fn detail(&self) -> String {
        match self {
            Self::FreshLogin => "no cached session, logged in".into(),
            Self::ExpiredRenewal => "cached session expired, renewed".into(),
            Self::ProbeRenewal => "cached session failed liveness probe, renewed".into(),
            Self::Reused { hours_left } => format!("cached session reused ({hours_left}h left)"),
            Self::Invalidated => "session invalidated".into(),
            Self::Swept => "expired session removed by sweep".into(),
            Self::LoginFailed { fatal: true } => "login failed: credentials rejected".into(),
            Self::LoginFailed { fatal: false } => "login failed: transient".into(),
        }
    }
}
