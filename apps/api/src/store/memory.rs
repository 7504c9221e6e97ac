use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::attendee::AttendeeRecord;
use crate::models::checkin::{CheckinEvent, Meal};
use crate::models::judging::JudgingScoreEntry;
use crate::models::profile::{ProfilePatch, ProfileRecord, TeammateCandidate};
use crate::store::{AttendeeStore, StoreError};

#[derive(Default)]
struct Tables {
    attendees: Vec<AttendeeRecord>,
    profiles: HashMap<Uuid, ProfileRecord>,
    checkins: Vec<CheckinEvent>,
    scores: Vec<JudgingScoreEntry>,
}

/// In-process store. Used for `--dry-run` imports and as the test double.
///
/// With `enforce_unique = false` it behaves like an `attendees` table that lacks a
/// unique constraint on `submission_id`: upserts are rejected with
/// `MissingUniqueConstraint` and plain inserts happily store duplicates.
pub struct MemoryStore {
    enforce_unique: bool,
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<&'static str>>,
    lookup_delay: Option<Duration>,
    lookups: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MemoryStore {
    pub fn new(enforce_unique: bool) -> Self {
        Self {
            enforce_unique,
            tables: Mutex::new(Tables::default()),
            failing: Mutex::new(HashSet::new()),
            lookup_delay: None,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Delays every profile lookup, to exercise timeouts and stale responses.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// Makes the named operation fail with `StoreError::Unavailable` until cleared.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing_set().insert(operation);
    }

    pub fn clear_failures(&self) {
        self.failing_set().clear();
    }

    pub fn seed_profile(&self, profile: ProfileRecord) {
        self.tables().profiles.insert(profile.id, profile);
    }

    pub fn seed_attendee(&self, record: AttendeeRecord) {
        self.tables().attendees.push(record);
    }

    pub fn attendees(&self) -> Vec<AttendeeRecord> {
        self.tables().attendees.clone()
    }

    pub fn profile(&self, id: Uuid) -> Option<ProfileRecord> {
        self.tables().profiles.get(&id).cloned()
    }

    /// Number of distinct submission ids stored.
    pub fn distinct_submission_ids(&self) -> usize {
        self.tables()
            .attendees
            .iter()
            .filter_map(|a| a.submission_id.as_ref().map(|id| id.to_string()))
            .collect::<HashSet<_>>()
            .len()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failing_set(&self) -> std::sync::MutexGuard<'_, HashSet<&'static str>> {
        self.failing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.failing_set().contains(operation) {
            return Err(StoreError::Unavailable(format!("{operation} is failing")));
        }
        Ok(())
    }

    /// Profile lookups issued so far (email, name and combined).
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn lookup_pause(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn key(record: &AttendeeRecord) -> Option<String> {
        record.submission_id.as_ref().map(|id| id.to_string())
    }

    fn check_duplicates(tables: &Tables, records: &[AttendeeRecord]) -> Result<(), StoreError> {
        let mut seen: HashSet<String> = tables.attendees.iter().filter_map(Self::key).collect();
        for key in records.iter().filter_map(Self::key) {
            if !seen.insert(key.clone()) {
                return Err(StoreError::Duplicate(format!("submission_id {key}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AttendeeStore for MemoryStore {
    async fn find_attendee_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AttendeeRecord>, StoreError> {
        self.check("find_attendee_by_email")?;
        let needle = email.trim().to_lowercase();
        let tables = self.tables();
        let best = tables
            .attendees
            .iter()
            .filter(|a| a.email_key().as_deref() == Some(needle.as_str()))
            .max_by_key(|a| a.submitted_at)
            .cloned();
        Ok(best)
    }

    async fn existing_submission_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        self.check("existing_submission_ids")?;
        let wanted: HashSet<&String> = ids.iter().collect();
        Ok(self
            .tables()
            .attendees
            .iter()
            .filter_map(Self::key)
            .filter(|k| wanted.contains(k))
            .collect())
    }

    async fn upsert_attendees(&self, records: &[AttendeeRecord]) -> Result<usize, StoreError> {
        self.check("upsert_attendees")?;
        if !self.enforce_unique {
            return Err(StoreError::MissingUniqueConstraint(
                "submission_id".to_string(),
            ));
        }
        let mut tables = self.tables();
        for record in records {
            let key = Self::key(record);
            let position = tables
                .attendees
                .iter()
                .position(|a| key.is_some() && Self::key(a) == key);
            match position {
                Some(index) => tables.attendees[index] = record.clone(),
                None => tables.attendees.push(record.clone()),
            }
        }
        Ok(records.len())
    }

    async fn insert_attendees(&self, records: &[AttendeeRecord]) -> Result<usize, StoreError> {
        self.check("insert_attendees")?;
        let mut tables = self.tables();
        if self.enforce_unique {
            Self::check_duplicates(&tables, records)?;
        }
        tables.attendees.extend(records.iter().cloned());
        Ok(records.len())
    }

    async fn insert_attendee(&self, record: &AttendeeRecord) -> Result<(), StoreError> {
        self.check("insert_attendee")?;
        let mut tables = self.tables();
        if self.enforce_unique {
            Self::check_duplicates(&tables, std::slice::from_ref(record))?;
        }
        tables.attendees.push(record.clone());
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, StoreError> {
        self.check("get_profile")?;
        Ok(self.profile(id))
    }

    async fn find_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<TeammateCandidate>, StoreError> {
        self.lookup_pause().await;
        self.check("find_profile_by_email")?;
        let tables = self.tables();
        Ok(tables
            .profiles
            .values()
            .find(|p| p.email.as_deref() == Some(email))
            .map(TeammateCandidate::from))
    }

    async fn find_profiles_by_emails(
        &self,
        emails: &[String],
    ) -> Result<Vec<ProfileRecord>, StoreError> {
        self.check("find_profiles_by_emails")?;
        let wanted: HashSet<&str> = emails.iter().map(String::as_str).collect();
        Ok(self
            .tables()
            .profiles
            .values()
            .filter(|p| {
                p.email
                    .as_deref()
                    .map(|e| wanted.contains(e.trim().to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn search_profiles_by_name(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<TeammateCandidate>, StoreError> {
        self.lookup_pause().await;
        self.check("search_profiles_by_name")?;
        let tables = self.tables();
        let mut matches: Vec<TeammateCandidate> = tables
            .profiles
            .values()
            .map(TeammateCandidate::from)
            .filter(|c| c.name_contains(needle))
            .collect();
        matches.sort_by(|a, b| a.display_name().cmp(&b.display_name()));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn lookup_teammates(
        &self,
        emails: &[String],
        names: &[String],
    ) -> Result<Vec<TeammateCandidate>, StoreError> {
        self.lookup_pause().await;
        self.check("lookup_teammates")?;
        let tables = self.tables();
        Ok(tables
            .profiles
            .values()
            .map(TeammateCandidate::from)
            .filter(|c| {
                let email_hit = c
                    .email
                    .as_ref()
                    .map(|e| emails.contains(e))
                    .unwrap_or(false);
                email_hit || names.iter().any(|n| c.name_contains(n))
            })
            .collect())
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), StoreError> {
        self.check("insert_profile")?;
        self.tables()
            .profiles
            .entry(profile.id)
            .or_insert_with(|| profile.clone());
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<bool, StoreError> {
        self.check("update_profile")?;
        match self.tables().profiles.get_mut(&id) {
            Some(profile) => {
                profile.apply_patch(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_teammates(&self, id: Uuid, teammates: Option<&str>) -> Result<bool, StoreError> {
        self.check("set_teammates")?;
        match self.tables().profiles.get_mut(&id) {
            Some(profile) => {
                profile.teammates = teammates.map(str::to_string);
                profile.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_meals_received(&self, id: Uuid, meals: &[Meal]) -> Result<(), StoreError> {
        self.check("set_meals_received")?;
        if let Some(profile) = self.tables().profiles.get_mut(&id) {
            profile.breakfast_received |= meals.contains(&Meal::Breakfast);
            profile.lunch_received |= meals.contains(&Meal::Lunch);
            profile.dinner_received |= meals.contains(&Meal::Dinner);
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_checkin(&self, event: &CheckinEvent) -> Result<(), StoreError> {
        self.check("insert_checkin")?;
        self.tables().checkins.push(event.clone());
        Ok(())
    }

    async fn list_checkins(&self, profile_id: Uuid) -> Result<Vec<CheckinEvent>, StoreError> {
        self.check("list_checkins")?;
        Ok(self
            .tables()
            .checkins
            .iter()
            .filter(|c| c.profile_id == profile_id)
            .cloned()
            .collect())
    }

    async fn insert_score(&self, entry: &JudgingScoreEntry) -> Result<(), StoreError> {
        self.check("insert_score")?;
        self.tables().scores.push(entry.clone());
        Ok(())
    }

    async fn list_scores(&self) -> Result<Vec<JudgingScoreEntry>, StoreError> {
        self.check("list_scores")?;
        Ok(self.tables().scores.clone())
    }
}
