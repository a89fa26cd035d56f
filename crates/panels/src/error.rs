use thiserror::Error;

/// Errors produced by panel adapters and their auth flows.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Hardware identifier / device secret / password rejected by the panel.
    /// Fatal: never retried, and any cached session must be invalidated.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Soft authentication failure (captcha rejected, token mismatch,
    /// relay-reported login failure). Retryable within the variant's budget.
    #[error("transient auth failure: {0}")]
    TransientAuth(String),

    /// Panel, relay, or solving service unreachable or timing out.
    #[error("panel unavailable: {0}")]
    Unavailable(String),

    /// The panel answered with a shape the adapter cannot interpret.
    /// Retry-wise equivalent to `Unavailable`, but logged distinctly.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Captcha solving budget exhausted across both phases.
    #[error("captcha unsolved: {0}")]
    CaptchaUnsolved(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PanelError {
    /// Credentials problem: retrying can only burn lockout budget.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_))
    }

    /// Safe to retry within an adapter's bounded budget.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientAuth(_)
            | Self::Unavailable(_)
            | Self::MalformedResponse(_)
            | Self::CaptchaUnsolved(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::InvalidCredentials(_) | Self::Json(_) => false,
        }
    }

    /// Collapse a reqwest failure into the taxonomy. Timeouts and transport
    /// errors become `Unavailable`; anything else stays `Http`.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}
