//! Attendee store — the single seam between reconciliation logic and persistence.
//!
//! Every component receives an `Arc<dyn AttendeeStore>` built once at startup.
//! `PgStore` is the production backend; `MemoryStore` backs dry-run imports and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::attendee::AttendeeRecord;
use crate::models::checkin::{CheckinEvent, Meal};
use crate::models::judging::JudgingScoreEntry;
use crate::models::profile::{ProfilePatch, ProfileRecord, TeammateCandidate};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Postgres: "there is no unique or exclusion constraint matching the ON CONFLICT specification".
const SQLSTATE_NO_MATCHING_CONSTRAINT: &str = "42P10";
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no unique constraint matches conflict key '{0}'")]
    MissingUniqueConstraint(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("store request timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(SQLSTATE_NO_MATCHING_CONSTRAINT) => {
                    return StoreError::MissingUniqueConstraint(db_err.message().to_string())
                }
                Some(SQLSTATE_UNIQUE_VIOLATION) => {
                    return StoreError::Duplicate(db_err.message().to_string())
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Query surface consumed by the reconciler, resolver and consoles.
#[async_trait]
pub trait AttendeeStore: Send + Sync {
    /// Most recent registration whose email matches case-insensitively.
    async fn find_attendee_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AttendeeRecord>, StoreError>;

    /// Subset of `ids` already present as `submission_id`.
    async fn existing_submission_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError>;

    /// Insert-or-replace keyed on `submission_id`.
    async fn upsert_attendees(&self, records: &[AttendeeRecord]) -> Result<usize, StoreError>;

    /// Plain multi-row insert. All-or-nothing.
    async fn insert_attendees(&self, records: &[AttendeeRecord]) -> Result<usize, StoreError>;

    async fn insert_attendee(&self, record: &AttendeeRecord) -> Result<(), StoreError>;

    async fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, StoreError>;

    /// Exact email equality, at most one row.
    async fn find_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<TeammateCandidate>, StoreError>;

    /// Profiles whose lower-cased email is in `emails` (expected lower-cased).
    async fn find_profiles_by_emails(
        &self,
        emails: &[String],
    ) -> Result<Vec<ProfileRecord>, StoreError>;

    /// Case-insensitive partial name match, capped at `limit`.
    async fn search_profiles_by_name(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<TeammateCandidate>, StoreError>;

    /// One disjunctive lookup: exact email in `emails` OR name containing any of `names`.
    async fn lookup_teammates(
        &self,
        emails: &[String],
        names: &[String],
    ) -> Result<Vec<TeammateCandidate>, StoreError>;

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), StoreError>;

    /// Fills empty columns from `patch`; populated columns are left alone.
    /// Returns false when the profile does not exist.
    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<bool, StoreError>;

    /// Explicit user edit of the teammates field; overwrites.
    async fn set_teammates(&self, id: Uuid, teammates: Option<&str>) -> Result<bool, StoreError>;

    async fn set_meals_received(&self, id: Uuid, meals: &[Meal]) -> Result<(), StoreError>;

    async fn insert_checkin(&self, event: &CheckinEvent) -> Result<(), StoreError>;

    async fn list_checkins(&self, profile_id: Uuid) -> Result<Vec<CheckinEvent>, StoreError>;

    async fn insert_score(&self, entry: &JudgingScoreEntry) -> Result<(), StoreError>;

    async fn list_scores(&self) -> Result<Vec<JudgingScoreEntry>, StoreError>;
}

/// Escapes LIKE metacharacters and wraps the needle for a contains-match.
pub fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
