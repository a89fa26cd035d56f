//! Sequential per-account execution of a migration job.
//!
//! Accounts are processed strictly one at a time; parallel logins against a
//! single panel would trip captcha and rate limits. One account's failure is
//! recorded and never aborts the job.

use std::sync::Arc;

use panel_types::{Account, AccountDirectory, EntryDraft, PlaylistEntry};
use panels_api::adapter::AdapterProvider;
use session_cache::SessionCache;
use tracing::{debug, info, instrument, warn};

use crate::job::{MigrationError, MigrationJob, MigrationMode};
use crate::report::{AccountOutcome, MigrationReport, Tally};
use crate::rewrite::{host_of, rewrite_host};

/// Incremental progress, emitted after every account.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Accounts processed so far (1-based after the first account).
    pub processed: usize,
    pub total: usize,
    pub tally: Tally,
}

pub trait ProgressSink: Send + Sync {
    fn on_account(&self, progress: &Progress);
}

/// Sink for callers that do not render progress.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_account(&self, _progress: &Progress) {}
}

pub struct MigrationRunner {
    adapters: Arc<dyn AdapterProvider>,
    cache: Arc<SessionCache>,
    directory: Arc<dyn AccountDirectory>,
}

impl MigrationRunner {
    pub fn new(
        adapters: Arc<dyn AdapterProvider>,
        cache: Arc<SessionCache>,
        directory: Arc<dyn AccountDirectory>,
    ) -> Self {
        Self {
            adapters,
            cache,
            directory,
        }
    }

    /// Execute a confirmed job to completion (or cancellation).
    pub async fn run(
        &self,
        job: &mut MigrationJob,
        progress: &dyn ProgressSink,
    ) -> Result<MigrationReport, MigrationError> {
        job.begin_running()?;
        let cancel = job.cancellation_token();
        let total = job.accounts().len();
        let mode = job.mode().clone();
        let new_domain = job.new_domain().to_string();

        let mut outcomes = Vec::with_capacity(total);
        let mut tally = Tally::default();
        let mut cancelled = false;

        for (index, account) in job.accounts().to_vec().into_iter().enumerate() {
            // Cancellation takes effect between accounts; in-flight panel
            // calls are never preempted.
            if cancel.is_cancelled() {
                warn!(remaining = total - index, "Migration cancelled between accounts");
                cancelled = true;
                for account in &job.accounts()[index..] {
                    let outcome = AccountOutcome::skipped(
                        &account.id,
                        &account.name,
                        "job cancelled before this account was reached",
                    );
                    tally.absorb(&outcome);
                    outcomes.push(outcome);
                }
                break;
            }

            let outcome = self.process_account(&account, &mode, &new_domain).await;
            self.audit(&account, &outcome, &new_domain).await;
            tally.absorb(&outcome);
            outcomes.push(outcome);
            progress.on_account(&Progress {
                processed: index + 1,
                total,
                tally,
            });
        }

        job.finish(cancelled);
        let report = MigrationReport::from_outcomes(outcomes, cancelled);
        info!(summary = %report.summary(), "Migration finished");
        Ok(report)
    }

    /// Process one account end to end. Every error path folds into the
    /// outcome; nothing escapes to abort the job.
    #[instrument(skip(self, account, mode), fields(account = %account.id, panel = %account.panel))]
    async fn process_account(
        &self,
        account: &Account,
        mode: &MigrationMode,
        new_domain: &str,
    ) -> AccountOutcome {
        let adapter = self.adapters.adapter_for(account.panel);

        let session = match self.cache.resolve(account, adapter.as_ref()).await {
            Ok(session) => session,
            Err(e) => return AccountOutcome::failed(&account.id, &account.name, 0, e.to_string()),
        };

        let entries = match adapter.list_entries(account, &session.artifact).await {
            Ok(entries) => entries,
            Err(e) => return AccountOutcome::failed(&account.id, &account.name, 0, e.to_string()),
        };
        if entries.is_empty() {
            debug!("No playlist entries; skipping");
            return AccountOutcome::skipped(&account.id, &account.name, "no playlist entries");
        }

        let candidates = select_candidates(&entries, mode);
        if candidates.is_empty() {
            return AccountOutcome::skipped(&account.id, &account.name, "no entries matched the mode");
        }

        let mut changed = 0usize;
        for entry in candidates {
            let Some(new_url) = rewrite_host(&entry.url, new_domain) else {
                debug!(url = %entry.url, "Entry URL has no host; leaving untouched");
                continue;
            };
            if new_url == entry.url {
                continue;
            }

            let draft = EntryDraft {
                url: new_url,
                ..EntryDraft::from(entry)
            };
            if let Err(e) = adapter
                .edit_entry(account, &session.artifact, &entry.id, &draft)
                .await
            {
                // A partial account still reports how far it got.
                return AccountOutcome::failed(&account.id, &account.name, changed, e.to_string());
            }
            changed += 1;
        }

        if changed > 0 {
            AccountOutcome::succeeded(&account.id, &account.name, changed)
        } else {
            AccountOutcome::skipped(&account.id, &account.name, "all URLs already on the target domain")
        }
    }

    async fn audit(&self, account: &Account, outcome: &AccountOutcome, new_domain: &str) {
        let (success, detail) = match (&outcome.error, outcome.entries_changed) {
            (Some(error), _) => (false, error.clone()),
            (None, 0) => return, // skipped accounts leave no audit record
            (None, n) => (true, format!("{n} entr(ies) moved to {new_domain}")),
        };
        if let Err(e) = self
            .directory
            .record_event(&account.id, "bulk_domain_change", success, &detail)
            .await
        {
            warn!(account = %account.id, error = %e, "Failed to append migration audit event");
        }
    }
}

/// Candidate selection per mode.
fn select_candidates<'a>(
    entries: &'a [PlaylistEntry],
    mode: &MigrationMode,
) -> Vec<&'a PlaylistEntry> {
    match mode {
        MigrationMode::All => entries.iter().collect(),
        MigrationMode::FirstOnly => entries.iter().take(1).collect(),
        MigrationMode::MatchDomain { old_domain } => entries
            .iter()
            .filter(|entry| {
                host_of(&entry.url)
                    .map(|host| host.contains(old_domain.as_str()))
                    .unwrap_or(false)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_types::EntryId;

    fn entry(id: i64, url: &str) -> PlaylistEntry {
        PlaylistEntry {
            id: EntryId::Numeric(id),
            name: format!("entry-{id}"),
            url: url.to_string(),
            kind: "general".into(),
            protected: false,
            pin: String::new(),
        }
    }

    #[test]
    fn first_only_takes_exactly_one() {
        let entries = vec![
            entry(1, "http://a.example.com/x"),
            entry(2, "http://b.example.com/y"),
        ];
        let picked = select_candidates(&entries, &MigrationMode::FirstOnly);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, EntryId::Numeric(1));
    }

    #[test]
    fn match_domain_filters_on_host_only() {
        let entries = vec![
            // Host matches.
            entry(1, "http://old.example.com/get.php"),
            // Old domain appears in the path, not the host: not a candidate.
            entry(2, "http://other.example.com/old.example.com/feed"),
            // Case-insensitive host match.
            entry(3, "https://OLD.Example.COM:8080/x"),
        ];
        let picked = select_candidates(
            &entries,
            &MigrationMode::MatchDomain {
                old_domain: "old.example.com".into(),
            },
        );
        let ids: Vec<_> = picked.iter().map(|e| &e.id).collect();
        assert_eq!(ids, vec![&EntryId::Numeric(1), &EntryId::Numeric(3)]);
    }

    #[test]
    fn match_domain_is_substring_on_host() {
        let entries = vec![entry(1, "http://eu.old.example.com/x")];
        let picked = select_candidates(
            &entries,
            &MigrationMode::MatchDomain {
                old_domain: "old.example.com".into(),
            },
        );
        assert_eq!(picked.len(), 1);
    }
}
