//! Bulk playlist-domain migration.
//!
//! A [`job::MigrationJob`] fixes the target accounts, mode, and domains,
//! walks a confirm state machine, and is executed account-by-account by the
//! [`runner::MigrationRunner`]. Each account yields an immutable
//! [`report::AccountOutcome`]; the final [`report::MigrationReport`] is a
//! fold over those.

pub mod job;
pub mod report;
pub mod rewrite;
pub mod runner;

pub use job::{JobState, MigrationError, MigrationJob, MigrationMode};
pub use report::{AccountOutcome, MigrationReport, OutcomeStatus, Tally};
pub use rewrite::{host_of, normalize_target_domain, rewrite_host};
pub use runner::{MigrationRunner, NullProgress, Progress, ProgressSink};
