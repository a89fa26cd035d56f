//! The session cache itself.

use std::sync::Arc;

use dashmap::DashMap;
use panel_types::{Account, AccountId, AccountDirectory, AuthArtifact, PanelKind, SessionMirror};
use panels_api::PanelAdapter;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::policy::SessionPolicies;
use crate::session::{Session, SessionKey};
use crate::store::SessionStore;

pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn AccountDirectory>,
    policies: SessionPolicies,
    clock: Arc<dyn Clock>,
    /// Per-key locks so near-simultaneous resolves of the same account are
    /// single-flight instead of racing to a double login.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionCache {
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn AccountDirectory>,
        policies: SessionPolicies,
    ) -> Self {
        Self::with_clock(store, directory, policies, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn AccountDirectory>,
        policies: SessionPolicies,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            policies,
            clock,
            locks: DashMap::new(),
        }
    }

    pub fn policies(&self) -> &SessionPolicies {
        &self.policies
    }

    /// Read a persisted session; absent on miss or corruption.
    pub async fn get(
        &self,
        account: &AccountId,
        kind: PanelKind,
    ) -> Result<Option<Session>, SessionError> {
        self.store.read(&SessionKey::new(account, kind)).await
    }

    /// Persist a fresh artifact: expiry = now + kind TTL, and the account's
    /// session-state mirror is updated in the same call.
    pub async fn put(
        &self,
        account: &Account,
        artifact: AuthArtifact,
    ) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let expires_at = now + self.policies.for_kind(account.panel).ttl();
        let session = Session {
            account_id: account.id.clone(),
            panel: account.panel,
            artifact,
            created_at: now,
            expires_at,
            last_used_at: now,
        };
        self.store.write(&session).await?;
        self.directory
            .update_session_mirror(&account.id, SessionMirror::active_until(expires_at))
            .await?;
        Ok(session)
    }

    /// Delete the persisted session and clear the account mirror. Must be
    /// called whenever the credentials a session depends on change.
    pub async fn invalidate(
        &self,
        account: &AccountId,
        kind: PanelKind,
    ) -> Result<(), SessionError> {
        self.store.delete(&SessionKey::new(account, kind)).await?;
        self.directory
            .update_session_mirror(account, SessionMirror::cleared())
            .await?;
        debug!(%account, %kind, "Session invalidated");
        Ok(())
    }

    /// The single entry point: return a working session, logging in only
    /// when the cached one is absent, expired, or dead.
    ///
    /// Login failures from the adapter propagate unmodified; no retries
    /// happen at this layer.
    #[instrument(skip(self, account, adapter), fields(account = %account.id, panel = %account.panel))]
    pub async fn resolve(
        &self,
        account: &Account,
        adapter: &dyn PanelAdapter,
    ) -> Result<Session, SessionError> {
        let key = SessionKey::new(&account.id, account.panel);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let Some(session) = self.store.read(&key).await? else {
            debug!("No cached session; logging in");
            return self.login(account, adapter, SessionEvent::FreshLogin).await;
        };

        let now = self.clock.now();
        if session.is_expired_at(now) {
            info!("Cached session expired; renewing");
            self.invalidate(&account.id, account.panel).await?;
            return self.login(account, adapter, SessionEvent::ExpiredRenewal).await;
        }

        if self.policies.for_kind(account.panel).probe_before_use {
            let alive = match adapter.probe(account, &session.artifact).await {
                Ok(alive) => alive,
                Err(e) => {
                    warn!(error = %e, "Liveness probe errored; treating session as dead");
                    false
                }
            };
            if !alive {
                info!("Cached session failed liveness probe; renewing");
                self.invalidate(&account.id, account.panel).await?;
                return self.login(account, adapter, SessionEvent::ProbeRenewal).await;
            }
        }

        let session = self.touch(session, now).await?;
        let hours_left = session.hours_until_expiry(now);
        debug!(hours_left, "Reusing cached session");
        self.record(&account.id, &SessionEvent::Reused { hours_left }).await;
        Ok(session)
    }

    async fn login(
        &self,
        account: &Account,
        adapter: &dyn PanelAdapter,
        event: SessionEvent,
    ) -> Result<Session, SessionError> {
        match adapter.authenticate(account).await {
            Ok(artifact) => {
                let session = self.put(account, artifact).await?;
                info!(expires_at = %session.expires_at, "Login succeeded");
                self.record(&account.id, &event).await;
                Ok(session)
            }
            Err(err) => {
                self.record(&account.id, &SessionEvent::login_failed(&err)).await;
                Err(SessionError::Login(err))
            }
        }
    }

    /// Last-used bookkeeping on reuse, persisted best-effort.
    async fn touch(
        &self,
        mut session: Session,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Session, SessionError> {
        session.last_used_at = now;
        if let Err(e) = self.store.write(&session).await {
            warn!(error = %e, "Failed to persist last-used timestamp");
        }
        if let Err(e) = self.directory.touch_last_used(&session.account_id, now).await {
            warn!(error = %e, "Failed to mirror last-used timestamp");
        }
        Ok(session)
    }

    /// Audit record; failures never abort the operation being recorded.
    pub(crate) async fn record(&self, account: &AccountId, event: &SessionEvent) {
        if let Err(e) = self
            .directory
            .record_event(account, event.kind_str(), event.success(), &event.detail())
            .await
        {
            warn!(%account, error = %e, "Failed to append audit event");
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.lock_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
