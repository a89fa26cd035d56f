//! Session persistence abstraction.
//!
//! The cache never touches the filesystem directly; it goes through an
//! injected [`SessionStore`]. Production uses the file-per-key store, tests
//! use the in-memory one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::session::{Session, SessionKey};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails soft: a missing or unreadable record is `None`, never an error.
    async fn read(&self, key: &SessionKey) -> Result<Option<Session>, SessionError>;

    async fn write(&self, session: &Session) -> Result<(), SessionError>;

    /// Deleting an absent record is not an error.
    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError>;

    /// Every persisted session, for the expiry sweep.
    async fn scan(&self) -> Result<Vec<Session>, SessionError>;
}

/// One JSON document per (account, panel kind) under a spool directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_name()))
    }

    async fn ensure_dir(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SessionError::Store(format!("create {}: {e}", self.dir.display())))
    }

    fn parse(path: &Path, raw: &[u8]) -> Option<Session> {
        match serde_json::from_slice::<Session>(raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt session record; ignoring");
                None
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn read(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Self::parse(&path, &raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable session record; ignoring");
                Ok(None)
            }
        }
    }

    async fn write(&self, session: &Session) -> Result<(), SessionError> {
        self.ensure_dir().await?;
        let path = self.path_for(&session.key());
        let raw = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| SessionError::Store(format!("write {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Session persisted");
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Store(format!("delete {}: {e}", path.display()))),
        }
    }

    async fn scan(&self) -> Result<Vec<Session>, SessionError> {
        let mut sessions = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => {
                return Err(SessionError::Store(format!(
                    "scan {}: {e}",
                    self.dir.display()
                )));
            }
        };

        while let Some(dirent) = dir
            .next_entry()
            .await
            .map_err(|e| SessionError::Store(format!("scan {}: {e}", self.dir.display())))?
        {
            let path = dirent.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Ok(raw) = tokio::fs::read(&path).await
                && let Some(session) = Self::parse(&path, &raw)
            {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }
}

/// In-memory store, primarily a test double.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<HashMap<SessionKey, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self.inner.read().get(key).cloned())
    }

    async fn write(&self, session: &Session) -> Result<(), SessionError> {
        self.inner.write().insert(session.key(), session.clone());
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        self.inner.write().remove(key);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Session>, SessionError> {
        Ok(self.inner.read().values().cloned().collect())
    }
}
