//! Command execution over the assembled core.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use domain_migrate::{
    MigrationJob, MigrationMode, MigrationRunner, Progress, ProgressSink,
};
use panel_types::{Account, AccountDirectory, AccountId, EntryDraft, EntryId, PlaylistEntry};
use panels_api::{AdapterSet, PanelAdapter};
use session_cache::{FileSessionStore, SessionCache, run_sweeper, sweep_expired};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{MigrateArgs, MigrateModeArg, PlaylistCommand, SessionCommand};
use crate::config::AppConfig;
use crate::directory::JsonAccountDirectory;

pub struct CommandExecutor {
    directory: Arc<JsonAccountDirectory>,
    adapters: Arc<AdapterSet>,
    cache: Arc<SessionCache>,
}

impl CommandExecutor {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let directory = Arc::new(JsonAccountDirectory::open(
            config.storage.accounts_file.clone(),
            config.storage.audit_log.clone(),
        )?);
        let adapters = Arc::new(AdapterSet::new(panels_api::default_client(), &config.panels));
        let cache = Arc::new(SessionCache::new(
            Arc::new(FileSessionStore::new(config.sessions.store_dir.clone())),
            directory.clone(),
            config.sessions.policies,
        ));
        Ok(Self {
            directory,
            adapters,
            cache,
        })
    }

    async fn account(&self, id: &str) -> Result<Account> {
        Ok(self.directory.get_account(&AccountId::new(id)).await?)
    }

    fn adapter(&self, account: &Account) -> Arc<dyn PanelAdapter> {
        self.adapters.adapter_for(account.panel)
    }

    pub async fn list_accounts(&self, group: Option<&str>) -> Result<()> {
        let accounts = self.directory.accounts_in_group(group).await?;
        if accounts.is_empty() {
            println!("no accounts");
            return Ok(());
        }
        for account in accounts {
            let session = match (account.has_session, account.session_expires_at) {
                (true, Some(expires)) => format!("session until {}", expires.format("%Y-%m-%d %H:%M")),
                _ => "no session".to_string(),
            };
            println!(
                "{:<12} {:<8} {:<20} group={:<10} {}",
                account.id,
                account.panel,
                account.name,
                account.group.as_deref().unwrap_or("-"),
                session
            );
        }
        Ok(())
    }

    pub async fn login(&self, account_id: &str) -> Result<()> {
        let account = self.account(account_id).await?;
        let adapter = self.adapter(&account);
        let session = self.cache.resolve(&account, adapter.as_ref()).await?;
        println!(
            "session for {} valid until {} ({}h left)",
            account.id,
            session.expires_at.format("%Y-%m-%d %H:%M"),
            session.hours_until_expiry(Utc::now())
        );
        Ok(())
    }

    pub async fn playlists(&self, command: PlaylistCommand) -> Result<()> {
        match command {
            PlaylistCommand::List { account } => self.list_playlists(&account).await,
            PlaylistCommand::Add {
                account,
                name,
                url,
                kind,
                protected,
                pin,
            } => {
                let draft = EntryDraft {
                    name,
                    url,
                    kind,
                    protected,
                    pin,
                };
                self.add_playlist(&account, draft).await
            }
            PlaylistCommand::Edit {
                account,
                entry,
                name,
                url,
                kind,
                protected,
                pin,
            } => {
                self.edit_playlist(&account, &entry, name, url, kind, protected, pin)
                    .await
            }
            PlaylistCommand::Delete { account, entry } => {
                self.delete_playlist(&account, &entry).await
            }
        }
    }

    async fn list_playlists(&self, account_id: &str) -> Result<()> {
        let account = self.account(account_id).await?;
        let adapter = self.adapter(&account);
        let session = self.cache.resolve(&account, adapter.as_ref()).await?;
        let entries = adapter.list_entries(&account, &session.artifact).await?;

        if entries.is_empty() {
            println!("no playlist entries");
            return Ok(());
        }
        for entry in entries {
            println!(
                "{:<10} {:<20} {:<8} {} {}",
                entry.id,
                entry.name,
                entry.kind,
                if entry.protected { "[pin]" } else { "     " },
                entry.url
            );
        }
        Ok(())
    }

    async fn add_playlist(&self, account_id: &str, draft: EntryDraft) -> Result<()> {
        let account = self.account(account_id).await?;
        let adapter = self.adapter(&account);
        let session = self.cache.resolve(&account, adapter.as_ref()).await?;
        let id = adapter.add_entry(&account, &session.artifact, &draft).await?;
        self.record(&account.id, "playlist_add", true, &format!("added {} ({})", draft.name, id))
            .await;
        println!("added entry {id}");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn edit_playlist(
        &self,
        account_id: &str,
        entry_id: &str,
        name: Option<String>,
        url: Option<String>,
        kind: Option<String>,
        protected: Option<bool>,
        pin: Option<String>,
    ) -> Result<()> {
        let account = self.account(account_id).await?;
        let adapter = self.adapter(&account);
        let session = self.cache.resolve(&account, adapter.as_ref()).await?;

        let entries = adapter.list_entries(&account, &session.artifact).await?;
        let current = find_entry(&entries, entry_id)
            .with_context(|| format!("entry {entry_id} not found on account {account_id}"))?;

        let mut draft = EntryDraft::from(current);
        if let Some(name) = name {
            draft.name = name;
        }
        if let Some(url) = url {
            draft.url = url;
        }
        if let Some(kind) = kind {
            draft.kind = kind;
        }
        if let Some(protected) = protected {
            draft.protected = protected;
        }
        if let Some(pin) = pin {
            draft.pin = pin;
        }

        adapter
            .edit_entry(&account, &session.artifact, &current.id, &draft)
            .await?;
        self.record(&account.id, "playlist_edit", true, &format!("edited {}", current.id))
            .await;
        println!("entry {} updated", current.id);
        Ok(())
    }

    async fn delete_playlist(&self, account_id: &str, entry_id: &str) -> Result<()> {
        let account = self.account(account_id).await?;
        let adapter = self.adapter(&account);
        let session = self.cache.resolve(&account, adapter.as_ref()).await?;

        let entries = adapter.list_entries(&account, &session.artifact).await?;
        let current = find_entry(&entries, entry_id)
            .with_context(|| format!("entry {entry_id} not found on account {account_id}"))?;

        adapter
            .delete_entry(&account, &session.artifact, &current.id)
            .await?;
        self.record(&account.id, "playlist_delete", true, &format!("deleted {}", current.id))
            .await;
        println!("entry {} deleted", current.id);
        Ok(())
    }

    pub async fn session(&self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::Show { account } => {
                let account = self.account(&account).await?;
                match self.cache.get(&account.id, account.panel).await? {
                    Some(session) => {
                        println!(
                            "panel={} created={} expires={} ({}h left) last_used={}",
                            session.panel,
                            session.created_at.format("%Y-%m-%d %H:%M"),
                            session.expires_at.format("%Y-%m-%d %H:%M"),
                            session.hours_until_expiry(Utc::now()),
                            session.last_used_at.format("%Y-%m-%d %H:%M"),
                        );
                    }
                    None => println!("no cached session"),
                }
                Ok(())
            }
            SessionCommand::Invalidate { account } => {
                let account = self.account(&account).await?;
                self.cache.invalidate(&account.id, account.panel).await?;
                println!("session invalidated");
                Ok(())
            }
            SessionCommand::Sweep => {
                let swept = sweep_expired(&self.cache).await?;
                println!("{swept} expired session(s) removed");
                Ok(())
            }
            SessionCommand::Sweeper { period_hours } => {
                let cancel = CancellationToken::new();
                let sweeper = tokio::spawn(run_sweeper(
                    self.cache.clone(),
                    Duration::from_secs(period_hours * 60 * 60),
                    cancel.clone(),
                ));
                info!(period_hours, "Sweeper running; ctrl-c to stop");
                tokio::signal::ctrl_c().await?;
                cancel.cancel();
                let _ = sweeper.await;
                Ok(())
            }
        }
    }

    pub async fn migrate(&self, args: MigrateArgs) -> Result<()> {
        let accounts = self.migration_targets(&args).await?;
        if accounts.is_empty() {
            bail!("no target accounts (empty group or id list)");
        }

        let mode = match args.mode {
            MigrateModeArg::All => MigrationMode::All,
            MigrateModeArg::First => MigrationMode::FirstOnly,
            MigrateModeArg::Match => MigrationMode::MatchDomain {
                old_domain: args
                    .old_domain
                    .clone()
                    .context("--mode match requires --old-domain")?,
            },
        };

        let mut job = MigrationJob::configure(accounts, mode, &args.new_domain)?;
        let preview = job.preview()?;
        println!("{preview}");

        if !args.yes {
            job.cancel()?;
            println!("dry preview only; re-run with --yes to execute");
            return Ok(());
        }
        job.confirm()?;

        let runner = MigrationRunner::new(
            self.adapters.clone(),
            self.cache.clone(),
            self.directory.clone(),
        );
        let report = runner.run(&mut job, &PrintProgress).await?;
        println!("{}", report.summary());
        Ok(())
    }

    async fn migration_targets(&self, args: &MigrateArgs) -> Result<Vec<Account>> {
        if !args.accounts.is_empty() {
            let mut accounts = Vec::with_capacity(args.accounts.len());
            for id in &args.accounts {
                accounts.push(self.account(id).await?);
            }
            return Ok(accounts);
        }
        Ok(self.directory.accounts_in_group(args.group.as_deref()).await?)
    }

    async fn record(&self, id: &AccountId, kind: &str, success: bool, detail: &str) {
        if let Err(e) = self.directory.record_event(id, kind, success, detail).await {
            tracing::warn!(error = %e, "Failed to append audit event");
        }
    }
}

/// Match an operator-typed entry id against backend-native ids.
fn find_entry<'a>(entries: &'a [PlaylistEntry], raw: &str) -> Option<&'a PlaylistEntry> {
    entries.iter().find(|entry| match &entry.id {
        EntryId::Text(s) => s == raw,
        EntryId::Numeric(n) => raw.parse::<i64>() == Ok(*n),
    })
}

struct PrintProgress;

impl ProgressSink for PrintProgress {
    fn on_account(&self, progress: &Progress) {
        println!(
            "[{}/{}] ok={} failed={} skipped={} entries={}",
            progress.processed,
            progress.total,
            progress.tally.succeeded,
            progress.tally.failed,
            progress.tally.skipped,
            progress.tally.entries_changed,
        );
    }
}
