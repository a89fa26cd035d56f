//! Periodic expiry sweep.
//!
//! `resolve` already renews expired sessions on demand, but sessions that
//! are never resolved again would linger forever; the sweep bounds storage
//! growth by scanning the whole store and deleting everything past expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::SessionCache;
use crate::error::SessionError;
use crate::events::SessionEvent;

pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);

/// Delete every persisted session whose expiry has passed. Returns how many
/// were removed.
pub async fn sweep_expired(cache: &SessionCache) -> Result<usize, SessionError> {
    let now = cache.clock().now();
    let mut swept = 0usize;

    for session in cache.store().scan().await? {
        if !session.is_expired_at(now) {
            continue;
        }
        match cache.invalidate(&session.account_id, session.panel).await {
            Ok(()) => {
                cache.record(&session.account_id, &SessionEvent::Swept).await;
                swept += 1;
            }
            Err(e) => {
                warn!(account = %session.account_id, error = %e, "Sweep failed to invalidate session")
            }
        }
    }

    if swept > 0 {
        info!(swept, "Expiry sweep removed stale sessions");
    }
    Ok(swept)
}

/// Drive [`sweep_expired`] on a fixed period until cancelled.
pub async fn run_sweeper(cache: Arc<SessionCache>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    // The immediate first tick would sweep at startup; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = sweep_expired(&cache).await {
                    warn!(error = %e, "Expiry sweep failed");
                }
            }
        }
    }
}
