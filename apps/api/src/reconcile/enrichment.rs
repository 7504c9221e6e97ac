//! Profile enrichment — fills empty profile fields from a matching registration.
//!
//! Never overwrites a populated field and never writes when nothing qualifies.
//! Runs beside the sign-in flow, so store failures are logged and swallowed.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::attendee::AttendeeRecord;
use crate::models::profile::{AuthIdentity, ProfilePatch, ProfileRecord};
use crate::store::{AttendeeStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentPlan {
    /// No profile yet: create one from the identity plus every non-empty source field.
    Create(Box<ProfileRecord>),
    /// Fill only these fields.
    Update(ProfilePatch),
    NoChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    Updated { fields: Vec<String> },
    Unchanged,
    NoRegistration,
    Skipped { reason: String },
}

trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Blank for bool {
    fn is_blank(&self) -> bool {
        false
    }
}

impl Blank for chrono::NaiveDate {
    fn is_blank(&self) -> bool {
        false
    }
}

fn present<T: Blank>(value: &Option<T>) -> bool {
    value.as_ref().map_or(false, |v| !v.is_blank())
}

/// Source value if the source has one and the destination does not.
fn gap<T: Blank + Clone>(dest: &Option<T>, src: &Option<T>) -> Option<T> {
    if present(src) && !present(dest) {
        src.clone()
    } else {
        None
    }
}

/// Field-by-field diff of `source` against `profile`.
pub fn diff_profile(profile: &ProfileRecord, source: &AttendeeRecord) -> ProfilePatch {
    let source_id = source.submission_id.as_ref().map(ToString::to_string);
    ProfilePatch {
        full_name: gap(&profile.full_name, &source.full_name()),
        first_name: gap(&profile.first_name, &source.first_name),
        last_name: gap(&profile.last_name, &source.last_name),
        phone_number: gap(&profile.phone_number, &source.phone_number),
        date_of_birth: gap(&profile.date_of_birth, &source.date_of_birth),
        school: gap(&profile.school, &source.school),
        grade: gap(&profile.grade, &source.grade),
        city: gap(&profile.city, &source.city),
        parent_name: gap(&profile.parent_name, &source.parent_name),
        parent_email: gap(&profile.parent_email, &source.parent_email),
        parent_phone: gap(&profile.parent_phone, &source.parent_phone),
        participating_solo: gap(&profile.participating_solo, &source.participating_solo),
        looking_for_teammates: gap(
            &profile.looking_for_teammates,
            &source.looking_for_teammates,
        ),
        teammates: gap(&profile.teammates, &source.teammates),
        is_vegetarian: gap(&profile.is_vegetarian, &source.is_vegetarian),
        allergies: gap(&profile.allergies, &source.allergies),
        submission_id: gap(&profile.submission_id, &source_id),
    }
}

pub fn plan_enrichment(
    existing: Option<&ProfileRecord>,
    identity: &AuthIdentity,
    source: &AttendeeRecord,
) -> EnrichmentPlan {
    match existing {
        Some(profile) => {
            let patch = diff_profile(profile, source);
            if patch.is_empty() {
                EnrichmentPlan::NoChange
            } else {
                EnrichmentPlan::Update(patch)
            }
        }
        None => {
            let mut profile = ProfileRecord::for_identity(identity);
            let patch = diff_profile(&profile, source);
            profile.apply_patch(&patch);
            EnrichmentPlan::Create(Box::new(profile))
        }
    }
}

/// Writes a plan. Returns false when nothing was written.
pub async fn apply_plan(
    store: &dyn AttendeeStore,
    profile_id: uuid::Uuid,
    plan: &EnrichmentPlan,
) -> Result<bool, StoreError> {
    match plan {
        EnrichmentPlan::Create(profile) => {
            store.insert_profile(profile).await?;
            Ok(true)
        }
        EnrichmentPlan::Update(patch) => store.update_profile(profile_id, patch).await,
        EnrichmentPlan::NoChange => Ok(false),
    }
}

/// Pulls the newest registration for the identity's email and fills the profile.
///
/// Always returns; any store error becomes `SyncOutcome::Skipped`.
pub async fn sync_profile_from_registration(
    store: &dyn AttendeeStore,
    identity: &AuthIdentity,
) -> SyncOutcome {
    match try_sync(store, identity).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Profile sync for {} skipped: {e}", identity.id);
            SyncOutcome::Skipped {
                reason: e.to_string(),
            }
        }
    }
}

async fn try_sync(
    store: &dyn AttendeeStore,
    identity: &AuthIdentity,
) -> Result<SyncOutcome, StoreError> {
    if identity.email.trim().is_empty() {
        return Ok(SyncOutcome::NoRegistration);
    }
    let Some(source) = store.find_attendee_by_email(&identity.email).await? else {
        debug!("No registration found for {}", identity.id);
        return Ok(SyncOutcome::NoRegistration);
    };
    let existing = store.get_profile(identity.id).await?;
    let plan = plan_enrichment(existing.as_ref(), identity, &source);

    let outcome = match &plan {
        EnrichmentPlan::Create(_) => SyncOutcome::Created,
        EnrichmentPlan::Update(patch) => SyncOutcome::Updated {
            fields: patch.field_names().into_iter().map(String::from).collect(),
        },
        EnrichmentPlan::NoChange => SyncOutcome::Unchanged,
    };
    apply_plan(store, identity.id, &plan).await?;

    if outcome != SyncOutcome::Unchanged {
        info!("Profile {} enriched from registration: {:?}", identity.id, outcome);
    }
    Ok(outcome)
}
