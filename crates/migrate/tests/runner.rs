//! End-to-end migration runner tests against scripted fakes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_migrate::{
    JobState, MigrationJob, MigrationMode, MigrationRunner, NullProgress, OutcomeStatus, Progress,
    ProgressSink,
};
use panel_types::{
    Account, AccountDirectory, AccountId, AuthArtifact, DirectoryError, EntryDraft, EntryId,
    PanelKind, PlaylistEntry, SessionMirror,
};
use panels_api::adapter::AdapterProvider;
use panels_api::{PanelAdapter, PanelError};
use parking_lot::Mutex;
use session_cache::{MemorySessionStore, SessionCache, SessionPolicies};

fn account(id: &str, panel: PanelKind) -> Account {
    Account {
        id: AccountId::new(id),
        name: format!("acct {id}"),
        panel,
        mac_address: "00:1A:79:00:00:01".into(),
        device_key: "111111".into(),
        password: Some("pw".into()),
        domain: Some("panel.example.com".into()),
        group: Some("g1".into()),
        has_session: false,
        session_expires_at: None,
        last_used_at: None,
    }
}

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

#[derive(Default)]
struct NullDirectory {
    events: Mutex<Vec<(AccountId, String, bool)>>,
}

#[async_trait]
impl AccountDirectory for NullDirectory {
    async fn get_account(&self, id: &AccountId) -> Result<Account, DirectoryError> {
        Err(DirectoryError::NotFound(id.clone()))
    }

    async fn accounts_in_group(
        &self,
        _group: Option<&str>,
    ) -> Result<Vec<Account>, DirectoryError> {
        Ok(vec![])
    }

    async fn update_session_mirror(
        &self,
        _id: &AccountId,
        _mirror: SessionMirror,
    ) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn touch_last_used(
        &self,
        _id: &AccountId,
        _at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn record_event(
        &self,
        id: &AccountId,
        kind: &str,
        success: bool,
        _detail: &str,
    ) -> Result<(), DirectoryError> {
        self.events.lock().push((id.clone(), kind.to_string(), success));
        Ok(())
    }
}

/// One adapter serving every panel kind, scripted per account id.
#[derive(Default)]
struct ScriptedPanel {
    entries: Mutex<HashMap<String, Vec<PlaylistEntry>>>,
    auth_failures: Mutex<HashMap<String, String>>,
    edit_failures: Mutex<HashMap<String, String>>,
    edits: Mutex<Vec<(String, EntryId, String)>>,
}

impl ScriptedPanel {
    fn with_entries(&self, id: &str, entries: Vec<PlaylistEntry>) {
        self.entries.lock().insert(id.to_string(), entries);
    }

    fn edits_for(&self, id: &str) -> Vec<(EntryId, String)> {
        self.edits
            .lock()
            .iter()
            .filter(|(account, _, _)| account == id)
            .map(|(_, entry, url)| (entry.clone(), url.clone()))
            .collect()
    }

    fn total_edits(&self) -> usize {
        self.edits.lock().len()
    }
}

#[async_trait]
impl PanelAdapter for ScriptedPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::Orbit
    }

    async fn authenticate(&self, account: &Account) -> Result<AuthArtifact, PanelError> {
        if let Some(reason) = self.auth_failures.lock().get(account.id.as_str()) {
            return Err(PanelError::InvalidCredentials(reason.clone()));
        }
        Ok(AuthArtifact::Orbit {
            domain: "panel.example.com".into(),
            cookies: vec!["sid=1".into()],
            device_id: None,
        })
    }

    async fn probe(
        &self,
        _account: &Account,
        _artifact: &AuthArtifact,
    ) -> Result<bool, PanelError> {
        Ok(true)
    }

    async fn list_entries(
        &self,
        account: &Account,
        _artifact: &AuthArtifact,
    ) -> Result<Vec<PlaylistEntry>, PanelError> {
        Ok(self
            .entries
            .lock()
            .get(account.id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn add_entry(
        &self,
        _account: &Account,
        _artifact: &AuthArtifact,
        _draft: &EntryDraft,
    ) -> Result<EntryId, PanelError> {
        unreachable!("migration never adds entries")
    }

    async fn edit_entry(
        &self,
        account: &Account,
        _artifact: &AuthArtifact,
        id: &EntryId,
        draft: &EntryDraft,
    ) -> Result<(), PanelError> {
        if let Some(reason) = self.edit_failures.lock().get(account.id.as_str()) {
            return Err(PanelError::Unavailable(reason.clone()));
        }
        self.edits
            .lock()
            .push((account.id.as_str().to_string(), id.clone(), draft.url.clone()));
        Ok(())
    }

    async fn delete_entry(
        &self,
        _account: &Account,
        _artifact: &AuthArtifact,
        _id: &EntryId,
    ) -> Result<(), PanelError> {
        unreachable!("migration never deletes entries")
    }
}

struct SameForAll(Arc<ScriptedPanel>);

impl AdapterProvider for SameForAll {
    fn adapter_for(&self, _kind: PanelKind) -> Arc<dyn PanelAdapter> {
        self.0.clone()
    }
}

fn runner(panel: Arc<ScriptedPanel>) -> MigrationRunner {
    let directory = Arc::new(NullDirectory::default());
    let cache = Arc::new(SessionCache::new(
        Arc::new(MemorySessionStore::new()),
        directory.clone(),
        SessionPolicies::default(),
    ));
    MigrationRunner::new(Arc::new(SameForAll(panel)), cache, directory)
}

fn confirmed_job(accounts: Vec<Account>, mode: MigrationMode, domain: &str) -> MigrationJob {
    let mut job = MigrationJob::configure(accounts, mode, domain).unwrap();
    job.preview().unwrap();
    job.confirm().unwrap();
    job
}

#[tokio::test]
async fn first_only_rewrites_exactly_one_entry() {
    let panel = Arc::new(ScriptedPanel::default());
    panel.with_entries(
        "a1",
        vec![
            entry(1, "http://old.example.com/get.php?u=a"),
            entry(2, "http://old.example.com/get.php?u=b"),
            entry(3, "http://old.example.com/get.php?u=c"),
        ],
    );
    let runner = runner(panel.clone());
    let mut job = confirmed_job(
        vec![account("a1", PanelKind::Orbit)],
        MigrationMode::FirstOnly,
        "new.example.com",
    );

    let report = runner.run(&mut job, &NullProgress).await.unwrap();
    let tally = report.tally();

    assert_eq!(panel.total_edits(), 1);
    assert_eq!(tally.entries_changed, 1);
    assert_eq!(tally.succeeded, 1);
    assert_eq!(job.state(), JobState::Done);

    let edits = panel.edits_for("a1");
    assert_eq!(edits[0].0, EntryId::Numeric(1));
    assert_eq!(edits[0].1, "http://new.example.com/get.php?u=a");
}

#[tokio::test]
async fn counts_always_sum_to_target_accounts() {
    let panel = Arc::new(ScriptedPanel::default());
    // a1 succeeds, a2 has no entries, a3 fails auth, a4 has no candidates.
    panel.with_entries("a1", vec![entry(1, "http://old.example.com/x")]);
    panel.with_entries("a2", vec![]);
    panel
        .auth_failures
        .lock()
        .insert("a3".into(), "device information is incorrect".into());
    panel.with_entries(
        "a4",
        vec![entry(9, "http://elsewhere.example.net/feed")],
    );

    let runner = runner(panel);
    let accounts = vec![
        account("a1", PanelKind::Orbit),
        account("a2", PanelKind::Astra),
        account("a3", PanelKind::Vela),
        account("a4", PanelKind::Orbit),
    ];
    let mut job = confirmed_job(
        accounts,
        MigrationMode::MatchDomain {
            old_domain: "old.example.com".into(),
        },
        "new.example.com",
    );

    let report = runner.run(&mut job, &NullProgress).await.unwrap();
    let tally = report.tally();
    assert_eq!(tally.accounts_total(), 4);
    assert_eq!(tally.succeeded, 1);
    assert_eq!(tally.failed, 1);
    assert_eq!(tally.skipped, 2);
}

#[tokio::test]
async fn one_failing_account_never_aborts_the_job() {
    let panel = Arc::new(ScriptedPanel::default());
    panel
        .auth_failures
        .lock()
        .insert("bad".into(), "rejected".into());
    panel.with_entries("good", vec![entry(1, "http://old.example.com/x")]);

    let runner = runner(panel.clone());
    let mut job = confirmed_job(
        vec![account("bad", PanelKind::Orbit), account("good", PanelKind::Orbit)],
        MigrationMode::All,
        "new.example.com",
    );
    let report = runner.run(&mut job, &NullProgress).await.unwrap();

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
    assert!(report.outcomes[0].error.as_deref().unwrap().contains("rejected"));
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Succeeded);
    assert_eq!(panel.total_edits(), 1);
}

#[tokio::test]
async fn urls_already_on_target_domain_are_not_edited() {
    let panel = Arc::new(ScriptedPanel::default());
    panel.with_entries("a1", vec![entry(1, "http://new.example.com/get.php?u=a")]);
    let runner = runner(panel.clone());
    let mut job = confirmed_job(
        vec![account("a1", PanelKind::Orbit)],
        MigrationMode::All,
        "new.example.com",
    );

    let report = runner.run(&mut job, &NullProgress).await.unwrap();
    assert_eq!(panel.total_edits(), 0);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Skipped);
}

#[tokio::test]
async fn filter_mode_never_touches_non_matching_hosts() {
    let panel = Arc::new(ScriptedPanel::default());
    panel.with_entries(
        "a1",
        vec![
            entry(1, "http://keep.example.net/x"),
            entry(2, "http://old.example.com/y"),
        ],
    );
    let runner = runner(panel.clone());
    let mut job = confirmed_job(
        vec![account("a1", PanelKind::Orbit)],
        MigrationMode::MatchDomain {
            old_domain: "old.example.com".into(),
        },
        "new.example.com",
    );

    runner.run(&mut job, &NullProgress).await.unwrap();
    let edits = panel.edits_for("a1");
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, EntryId::Numeric(2));
}

#[tokio::test]
async fn edit_failure_marks_account_failed_but_keeps_partial_count() {
    let panel = Arc::new(ScriptedPanel::default());
    panel.with_entries("a1", vec![entry(1, "http://old.example.com/x")]);
    panel.edit_failures.lock().insert("a1".into(), "panel down".into());

    let runner = runner(panel);
    let mut job = confirmed_job(
        vec![account("a1", PanelKind::Orbit)],
        MigrationMode::All,
        "new.example.com",
    );
    let report = runner.run(&mut job, &NullProgress).await.unwrap();
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(report.outcomes[0].entries_changed, 0);
    assert_eq!(report.tally().accounts_total(), 1);
}

struct CancelAfterFirst {
    job_token: tokio_util::sync::CancellationToken,
    seen: Mutex<Vec<Progress>>,
}

impl ProgressSink for CancelAfterFirst {
    fn on_account(&self, progress: &Progress) {
        self.seen.lock().push(*progress);
        if progress.processed == 1 {
            self.job_token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_between_accounts_skips_the_rest() {
    let panel = Arc::new(ScriptedPanel::default());
    for id in ["a1", "a2", "a3"] {
        panel.with_entries(id, vec![entry(1, "http://old.example.com/x")]);
    }
    let runner = runner(panel.clone());
    let mut job = confirmed_job(
        vec![
            account("a1", PanelKind::Orbit),
            account("a2", PanelKind::Orbit),
            account("a3", PanelKind::Orbit),
        ],
        MigrationMode::All,
        "new.example.com",
    );
    let sink = CancelAfterFirst {
        job_token: job.cancellation_token(),
        seen: Mutex::new(vec![]),
    };

    let report = runner.run(&mut job, &sink).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(job.state(), JobState::Cancelled);
    // Only the first account was touched; the other two are skipped so the
    // counts still cover every targeted account.
    assert_eq!(panel.total_edits(), 1);
    let tally = report.tally();
    assert_eq!(tally.accounts_total(), 3);
    assert_eq!(tally.succeeded, 1);
    assert_eq!(tally.skipped, 2);
}

#[tokio::test]
async fn progress_is_emitted_after_every_account() {
    let panel = Arc::new(ScriptedPanel::default());
    panel.with_entries("a1", vec![entry(1, "http://old.example.com/x")]);
    panel.with_entries("a2", vec![]);

    struct Collect(Mutex<Vec<Progress>>);
    impl ProgressSink for Collect {
        fn on_account(&self, progress: &Progress) {
            self.0.lock().push(*progress);
        }
    }

    let runner = runner(panel);
    let mut job = confirmed_job(
        vec![account("a1", PanelKind::Orbit), account("a2", PanelKind::Orbit)],
        MigrationMode::All,
        "new.example.com",
    );
    let sink = Collect(Mutex::new(vec![]));
    runner.run(&mut job, &sink).await.unwrap();

    let seen = sink.0.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].processed, 1);
    assert_eq!(seen[0].total, 2);
    assert_eq!(seen[1].tally.succeeded, 1);
    assert_eq!(seen[1].tally.skipped, 1);
}

#[tokio::test]
async fn run_requires_a_confirmed_job() {
    let panel = Arc::new(ScriptedPanel::default());
    let runner = runner(panel);
    let mut job =
        MigrationJob::configure(vec![], MigrationMode::All, "new.example.com").unwrap();
    assert!(runner.run(&mut job, &NullProgress).await.is_err());
}
