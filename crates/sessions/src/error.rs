use panel_types::DirectoryError;
use panels_api::PanelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Login failure, passed through from the adapter unmodified. The cache
    /// performs no retries of its own.
    #[error(transparent)]
    Login(#[from] PanelError),

    #[error("session store error: {0}")]
    Store(String),

    #[error("session encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl SessionError {
    /// The underlying panel error, when this wraps one.
    pub fn as_panel_error(&self) -> Option<&PanelError> {
        match self {
            Self::Login(err) => Some(err),
            _ => None,
        }
    }
}
