//! Migration job definition and state machine.

use panel_types::Account;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::rewrite::normalize_target_domain;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
    #[error("invalid target domain: {0}")]
    InvalidDomain(String),
    #[error("match-domain mode requires an old domain")]
    MissingOldDomain,
}

/// Which entries of each account are candidates for rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationMode {
    /// Every entry.
    All,
    /// Only the first listed entry.
    FirstOnly,
    /// Entries whose URL host contains the old domain (case-insensitive,
    /// host component only).
    MatchDomain { old_domain: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Configuring,
    Preview,
    Confirmed,
    Running,
    Done,
    Cancelled,
}

/// One bulk migration, scoped to a single invocation. Never persisted: a
/// crash loses the counters, not the already-applied panel mutations.
pub struct MigrationJob {
    accounts: Vec<Account>,
    mode: MigrationMode,
    new_domain: String,
    state: JobState,
    cancel: CancellationToken,
}

impl MigrationJob {
    /// Fix the job parameters. Domains are normalized (scheme and trailing
    /// slash stripped, lowercased) and validated up front.
    pub fn configure(
        accounts: Vec<Account>,
        mode: MigrationMode,
        new_domain: &str,
    ) -> Result<Self, MigrationError> {
        let new_domain = normalize_target_domain(new_domain)
            .ok_or_else(|| MigrationError::InvalidDomain(new_domain.to_string()))?;
        let mode = match mode {
            MigrationMode::MatchDomain { old_domain } => {
                let trimmed = old_domain.trim().to_ascii_lowercase();
                if trimmed.is_empty() {
                    return Err(MigrationError::MissingOldDomain);
                }
                MigrationMode::MatchDomain { old_domain: trimmed }
            }
            other => other,
        };

        Ok(Self {
            accounts,
            mode,
            new_domain,
            state: JobState::Configuring,
            cancel: CancellationToken::new(),
        })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn mode(&self) -> &MigrationMode {
        &self.mode
    }

    pub fn new_domain(&self) -> &str {
        &self.new_domain
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Operator-facing summary shown before confirmation. No network work
    /// happens here; it is a parameter gate only.
    pub fn preview(&mut self) -> Result<String, MigrationError> {
        self.transition(JobState::Configuring, JobState::Preview)?;
        let mode = match &self.mode {
            MigrationMode::All => "every playlist entry".to_string(),
            MigrationMode::FirstOnly => "only the first playlist entry".to_string(),
            MigrationMode::MatchDomain { old_domain } => {
                format!("entries on domain {old_domain}")
            }
        };
        Ok(format!(
            "{} account(s); rewriting {mode} to {}",
            self.accounts.len(),
            self.new_domain
        ))
    }

    pub fn confirm(&mut self) -> Result<(), MigrationError> {
        self.transition(JobState::Preview, JobState::Confirmed)
    }

    /// Abort before execution starts. During execution, cancellation goes
    /// through the token and takes effect between accounts.
    pub fn cancel(&mut self) -> Result<(), MigrationError> {
        match self.state {
            JobState::Configuring | JobState::Preview | JobState::Confirmed => {
                self.state = JobState::Cancelled;
                self.cancel.cancel();
                Ok(())
            }
            from => Err(MigrationError::InvalidTransition {
                from,
                to: JobState::Cancelled,
            }),
        }
    }

    pub(crate) fn begin_running(&mut self) -> Result<(), MigrationError> {
        self.transition(JobState::Confirmed, JobState::Running)
    }

    pub(crate) fn finish(&mut self, cancelled: bool) {
        self.state = if cancelled { JobState::Cancelled } else { JobState::Done };
    }

    fn transition(&mut self, from: JobState, to: JobState) -> Result<(), MigrationError> {
        if self.state != from {
            return Err(MigrationError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(mode: MigrationMode) -> MigrationJob {
        MigrationJob::configure(vec![], mode, "new.example.com").unwrap()
    }

    #[test]
    fn walks_the_happy_path() {
        let mut job = job(MigrationMode::All);
        assert_eq!(job.state(), JobState::Configuring);
        job.preview().unwrap();
        assert_eq!(job.state(), JobState::Preview);
        job.confirm().unwrap();
        assert_eq!(job.state(), JobState::Confirmed);
        job.begin_running().unwrap();
        assert_eq!(job.state(), JobState::Running);
        job.finish(false);
        assert_eq!(job.state(), JobState::Done);
    }

    #[test]
    fn confirm_requires_preview_first() {
        let mut job = job(MigrationMode::All);
        assert!(matches!(
            job.confirm(),
            Err(MigrationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn cancel_allowed_from_any_pre_running_state() {
        for advance in 0..3 {
            let mut job = job(MigrationMode::FirstOnly);
            if advance >= 1 {
                job.preview().unwrap();
            }
            if advance >= 2 {
                job.confirm().unwrap();
            }
            job.cancel().unwrap();
            assert_eq!(job.state(), JobState::Cancelled);
            assert!(job.cancellation_token().is_cancelled());
        }
    }

    #[test]
    fn cancel_rejected_once_running() {
        let mut job = job(MigrationMode::All);
        job.preview().unwrap();
        job.confirm().unwrap();
        job.begin_running().unwrap();
        assert!(job.cancel().is_err());
    }

    #[test]
    fn configure_normalizes_domains() {
        let job = MigrationJob::configure(
            vec![],
            MigrationMode::MatchDomain {
                old_domain: "  OLD.Example.com ".into(),
            },
            "https://New.Example.com/",
        )
        .unwrap();
        assert_eq!(job.new_domain(), "new.example.com");
        assert_eq!(
            job.mode(),
            &MigrationMode::MatchDomain {
                old_domain: "old.example.com".into()
            }
        );
    }

    #[test]
    fn configure_rejects_bad_input() {
        assert!(matches!(
            MigrationJob::configure(vec![], MigrationMode::All, "not a domain"),
            Err(MigrationError::InvalidDomain(_))
        ));
        assert!(matches!(
            MigrationJob::configure(
                vec![],
                MigrationMode::MatchDomain { old_domain: " ".into() },
                "new.example.com"
            ),
            Err(MigrationError::MissingOldDomain)
        ));
    }
}
