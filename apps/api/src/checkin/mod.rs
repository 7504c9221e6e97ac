// Check-in Console
// Staff record meals and attendance against a profile. Events are append-only;
// meal flags on the profile only ever flip to true.

pub mod handlers;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::checkin::{CheckinEvent, Meal};
use crate::models::profile::ProfileRecord;
use crate::store::AttendeeStore;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckinRequest {
    pub profile_id: Uuid,
    pub staff_id: Uuid,
    pub meals: Vec<Meal>,
    /// Free-text notes from the desk, appended to the profile's dietary snapshot.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Dietary notes as they stood at check-in time.
pub fn dietary_snapshot(profile: &ProfileRecord, staff_notes: Option<&str>) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if profile.is_vegetarian == Some(true) {
        parts.push("Vegetarian".to_string());
    }
    if let Some(allergies) = profile.allergies.as_deref().map(str::trim) {
        if !allergies.is_empty() {
            parts.push(format!("Allergies: {allergies}"));
        }
    }
    if let Some(notes) = staff_notes.map(str::trim) {
        if !notes.is_empty() {
            parts.push(notes.to_string());
        }
    }
    (!parts.is_empty()).then(|| parts.join("; "))
}

pub async fn record_checkin(
    store: &dyn AttendeeStore,
    req: &CheckinRequest,
) -> Result<CheckinEvent, AppError> {
    let staff = store.get_profile(req.staff_id).await?;
    if !staff.is_some_and(|s| s.is_admin) {
        return Err(AppError::Forbidden);
    }

    let profile = store
        .get_profile(req.profile_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", req.profile_id)))?;

    let mut meals: Vec<Meal> = Vec::new();
    for meal in &req.meals {
        if !meals.contains(meal) {
            meals.push(*meal);
        }
    }
    if meals.is_empty() {
        return Err(AppError::Validation(
            "at least one meal must be selected".to_string(),
        ));
    }

    let event = CheckinEvent {
        id: Uuid::new_v4(),
        profile_id: profile.id,
        meals,
        dietary_notes: dietary_snapshot(&profile, req.notes.as_deref()),
        staff_id: req.staff_id,
        created_at: Utc::now(),
    };
    store.insert_checkin(&event).await?;
    store.set_meals_received(profile.id, &event.meals).await?;

    info!(
        "Checked in {} for {:?} (staff {})",
        profile.id, event.meals, req.staff_id
    );
    Ok(event)
}

/// Check-in history for one profile, oldest first.
pub async fn list_history(
    store: &dyn AttendeeStore,
    profile_id: Uuid,
) -> Result<Vec<CheckinEvent>, AppError> {
    let mut events = store.list_checkins(profile_id).await?;
    events.sort_by_key(|e| e.created_at);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::AuthIdentity;
    use crate::store::MemoryStore;

    fn seed(store: &MemoryStore, email: &str, admin: bool) -> ProfileRecord {
        let mut p = ProfileRecord::for_identity(&AuthIdentity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        });
        p.is_admin = admin;
        store.seed_profile(p.clone());
        p
    }

    fn request(profile: &ProfileRecord, staff: &ProfileRecord, meals: Vec<Meal>) -> CheckinRequest {
        CheckinRequest {
            profile_id: profile.id,
            staff_id: staff.id,
            meals,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_checkin_sets_meal_flags() {
        let store = MemoryStore::default();
        let staff = seed(&store, "staff@x.com", true);
        let attendee = seed(&store, "a@x.com", false);

        let event = record_checkin(
            &store,
            &request(&attendee, &staff, vec![Meal::Lunch, Meal::Lunch]),
        )
        .await
        .unwrap();
        assert_eq!(event.meals, vec![Meal::Lunch]);

        let stored = store.profile(attendee.id).unwrap();
        assert!(stored.lunch_received);
        assert!(!stored.breakfast_received);
        assert!(!stored.dinner_received);

        record_checkin(&store, &request(&attendee, &staff, vec![Meal::Dinner]))
            .await
            .unwrap();
        let stored = store.profile(attendee.id).unwrap();
        assert!(stored.lunch_received && stored.dinner_received);
        assert_eq!(list_history(&store, attendee.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let store = MemoryStore::default();
        let staff = seed(&store, "staff@x.com", false);
        let attendee = seed(&store, "a@x.com", false);
        let err = record_checkin(&store, &request(&attendee, &staff, vec![Meal::Breakfast]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert!(list_history(&store, attendee.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_profile_and_empty_meals() {
        let store = MemoryStore::default();
        let staff = seed(&store, "staff@x.com", true);
        let ghost = ProfileRecord::for_identity(&AuthIdentity {
            id: Uuid::new_v4(),
            email: "ghost@x.com".to_string(),
        });
        let err = record_checkin(&store, &request(&ghost, &staff, vec![Meal::Lunch]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let attendee = seed(&store, "a@x.com", false);
        let err = record_checkin(&store, &request(&attendee, &staff, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_dietary_snapshot() {
        let mut p = ProfileRecord::for_identity(&AuthIdentity {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
        });
        assert_eq!(dietary_snapshot(&p, Some("  ")), None);
        p.is_vegetarian = Some(true);
        p.allergies = Some(" peanuts ".to_string());
        assert_eq!(
            dietary_snapshot(&p, Some("extra fruit")).as_deref(),
            Some("Vegetarian; Allergies: peanuts; extra fruit")
        );
    }
}
