//! Per-account outcomes and the aggregated report.

use panel_types::AccountId;
use serde::Serialize;

const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// At least one entry was actually rewritten.
    Succeeded,
    /// An error interrupted processing; captured in `error`.
    Failed,
    /// Nothing to do: no entries, no candidates, or all URLs already on the
    /// target domain. Also used for accounts never reached after a
    /// mid-job cancellation.
    Skipped,
}

/// Immutable record of one account's processing.
#[derive(Debug, Clone, Serialize)]
pub struct AccountOutcome {
    pub account_id: AccountId,
    pub account_name: String,
    pub status: OutcomeStatus,
    pub entries_changed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AccountOutcome {
    pub fn succeeded(id: &AccountId, name: &str, entries_changed: usize) -> Self {
        Self {
            account_id: id.clone(),
            account_name: name.to_string(),
            status: OutcomeStatus::Succeeded,
            entries_changed,
            error: None,
            detail: None,
        }
    }

    pub fn failed(id: &AccountId, name: &str, entries_changed: usize, error: String) -> Self {
        Self {
            account_id: id.clone(),
            account_name: name.to_string(),
            status: OutcomeStatus::Failed,
            entries_changed,
            error: Some(error),
            detail: None,
        }
    }

    pub fn skipped(id: &AccountId, name: &str, detail: &str) -> Self {
        Self {
            account_id: id.clone(),
            account_name: name.to_string(),
            status: OutcomeStatus::Skipped,
            entries_changed: 0,
            error: None,
            detail: Some(detail.to_string()),
        }
    }
}

/// Running counters derived from outcomes; snapshotted for progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub entries_changed: usize,
}

impl Tally {
    pub fn absorb(&mut self, outcome: &AccountOutcome) {
        match outcome.status {
            OutcomeStatus::Succeeded => self.succeeded += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
        self.entries_changed += outcome.entries_changed;
    }

    pub fn accounts_total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Final report: a fold over the per-account outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub outcomes: Vec<AccountOutcome>,
    pub cancelled: bool,
}

impl MigrationReport {
    pub fn from_outcomes(outcomes: Vec<AccountOutcome>, cancelled: bool) -> Self {
        Self { outcomes, cancelled }
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for outcome in &self.outcomes {
            tally.absorb(outcome);
        }
        tally
    }

    /// The first few error lines plus how many were truncated.
    pub fn error_lines(&self) -> (Vec<String>, usize) {
        let all: Vec<String> = self
            .outcomes
            .iter()
            .filter_map(|o| {
                o.error
                    .as_ref()
                    .map(|e| format!("{}: {e}", o.account_name))
            })
            .collect();
        let truncated = all.len().saturating_sub(MAX_REPORTED_ERRORS);
        (all.into_iter().take(MAX_REPORTED_ERRORS).collect(), truncated)
    }

    pub fn summary(&self) -> String {
        let tally = self.tally();
        let mut out = format!(
            "{} changed, {} failed, {} skipped; {} playlist entr{} rewritten",
            tally.succeeded,
            tally.failed,
            tally.skipped,
            tally.entries_changed,
            if tally.entries_changed == 1 { "y" } else { "ies" },
        );
        if self.cancelled {
            out.push_str(" (job cancelled before completion)");
        }
        let (errors, truncated) = self.error_lines();
        for line in &errors {
            out.push_str("\n  - ");
            out.push_str(line);
        }
        if truncated > 0 {
            out.push_str(&format!("\n  ... and {truncated} more error(s)"));
        }
        out
    }
}
