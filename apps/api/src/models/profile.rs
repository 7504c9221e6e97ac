use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity issued by the auth provider. Referenced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: String,
}

/// Auth-linked attendee record used by the dashboard and check-in console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub city: Option<String>,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
    pub participating_solo: Option<bool>,
    pub looking_for_teammates: Option<bool>,
    pub teammates: Option<String>,
    pub is_vegetarian: Option<bool>,
    pub allergies: Option<String>,
    pub submission_id: Option<String>,
    pub breakfast_received: bool,
    pub lunch_received: bool,
    pub dinner_received: bool,
    pub is_admin: bool,
    pub workshops_attended: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Empty profile for a freshly signed-up identity.
    pub fn for_identity(identity: &AuthIdentity) -> Self {
        let now = Utc::now();
        ProfileRecord {
            id: identity.id,
            email: Some(identity.email.trim().to_string()).filter(|e| !e.is_empty()),
            full_name: None,
            first_name: None,
            last_name: None,
            phone_number: None,
            date_of_birth: None,
            school: None,
            grade: None,
            city: None,
            parent_name: None,
            parent_email: None,
            parent_phone: None,
            participating_solo: None,
            looking_for_teammates: None,
            teammates: None,
            is_vegetarian: None,
            allergies: None,
            submission_id: None,
            breakfast_received: false,
            lunch_received: false,
            dinner_received: false,
            is_admin: false,
            workshops_attended: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> Option<String> {
        display_name(
            self.full_name.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }

    /// Applies a gap-filling patch in memory. Only empty fields are written.
    pub fn apply_patch(&mut self, patch: &ProfilePatch) {
        fill_text(&mut self.full_name, &patch.full_name);
        fill_text(&mut self.first_name, &patch.first_name);
        fill_text(&mut self.last_name, &patch.last_name);
        fill_text(&mut self.phone_number, &patch.phone_number);
        fill(&mut self.date_of_birth, &patch.date_of_birth);
        fill_text(&mut self.school, &patch.school);
        fill_text(&mut self.grade, &patch.grade);
        fill_text(&mut self.city, &patch.city);
        fill_text(&mut self.parent_name, &patch.parent_name);
        fill_text(&mut self.parent_email, &patch.parent_email);
        fill_text(&mut self.parent_phone, &patch.parent_phone);
        fill(&mut self.participating_solo, &patch.participating_solo);
        fill(&mut self.looking_for_teammates, &patch.looking_for_teammates);
        fill_text(&mut self.teammates, &patch.teammates);
        fill(&mut self.is_vegetarian, &patch.is_vegetarian);
        fill_text(&mut self.allergies, &patch.allergies);
        fill_text(&mut self.submission_id, &patch.submission_id);
        if !patch.is_empty() {
            self.updated_at = Utc::now();
        }
    }
}

fn fill_text(dest: &mut Option<String>, src: &Option<String>) {
    let dest_empty = dest.as_deref().map_or(true, |d| d.trim().is_empty());
    if dest_empty && src.is_some() {
        dest.clone_from(src);
    }
}

fn fill<T: Clone>(dest: &mut Option<T>, src: &Option<T>) {
    if dest.is_none() && src.is_some() {
        dest.clone_from(src);
    }
}

/// Set of profile fields to fill. `None` means "leave untouched".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub city: Option<String>,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
    pub participating_solo: Option<bool>,
    pub looking_for_teammates: Option<bool>,
    pub teammates: Option<String>,
    pub is_vegetarian: Option<bool>,
    pub allergies: Option<String>,
    pub submission_id: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self == &ProfilePatch::default()
    }

    /// Names of the fields this patch writes, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut push = |set: bool, name: &'static str| {
            if set {
                names.push(name);
            }
        };
        push(self.full_name.is_some(), "full_name");
        push(self.first_name.is_some(), "first_name");
        push(self.last_name.is_some(), "last_name");
        push(self.phone_number.is_some(), "phone_number");
        push(self.date_of_birth.is_some(), "date_of_birth");
        push(self.school.is_some(), "school");
        push(self.grade.is_some(), "grade");
        push(self.city.is_some(), "city");
        push(self.parent_name.is_some(), "parent_name");
        push(self.parent_email.is_some(), "parent_email");
        push(self.parent_phone.is_some(), "parent_phone");
        push(self.participating_solo.is_some(), "participating_solo");
        push(self.looking_for_teammates.is_some(), "looking_for_teammates");
        push(self.teammates.is_some(), "teammates");
        push(self.is_vegetarian.is_some(), "is_vegetarian");
        push(self.allergies.is_some(), "allergies");
        push(self.submission_id.is_some(), "submission_id");
        names
    }
}

/// Slim projection of a profile used by the teammate picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeammateCandidate {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl TeammateCandidate {
    pub fn display_name(&self) -> Option<String> {
        display_name(
            self.full_name.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }

    /// Case-insensitive substring match against the full name and "first last".
    pub fn name_contains(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        [self.full_name.as_deref().unwrap_or(""), joined.as_str()]
            .iter()
            .any(|hay| hay.to_lowercase().contains(&needle))
    }
}

impl From<&ProfileRecord> for TeammateCandidate {
    fn from(profile: &ProfileRecord) -> Self {
        TeammateCandidate {
            id: profile.id,
            full_name: profile.full_name.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
        }
    }
}

fn display_name(full: Option<&str>, first: Option<&str>, last: Option<&str>) -> Option<String> {
    if let Some(full) = full.map(str::trim).filter(|f| !f.is_empty()) {
        return Some(full.to_string());
    }
    let joined = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AuthIdentity {
        AuthIdentity {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
        }
    }

    #[test]
    fn test_apply_patch_fills_blank_string() {
        let mut profile = ProfileRecord::for_identity(&identity());
        profile.school = Some("  ".to_string());
        let patch = ProfilePatch {
            school: Some("Other High".to_string()),
            ..Default::default()
        };
        profile.apply_patch(&patch);
        assert_eq!(profile.school.as_deref(), Some("Other High"));
    }

    #[test]
    fn test_apply_patch_keeps_populated() {
        let mut profile = ProfileRecord::for_identity(&identity());
        profile.school = Some("Lincoln High".to_string());
        profile.is_vegetarian = Some(false);
        let patch = ProfilePatch {
            school: Some("Other High".to_string()),
            is_vegetarian: Some(true),
            ..Default::default()
        };
        profile.apply_patch(&patch);
        assert_eq!(profile.school.as_deref(), Some("Lincoln High"));
        assert_eq!(profile.is_vegetarian, Some(false));
    }

    #[test]
    fn test_patch_field_names() {
        let patch = ProfilePatch {
            city: Some("Reno".to_string()),
            submission_id: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(patch.field_names(), vec!["city", "submission_id"]);
        assert!(ProfilePatch::default().is_empty());
    }

    #[test]
    fn test_candidate_name_contains_is_case_insensitive() {
        let candidate = TeammateCandidate {
            id: Uuid::new_v4(),
            full_name: None,
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            email: None,
        };
        assert!(candidate.name_contains("jane d"));
        assert!(!candidate.name_contains("john"));
        assert!(!candidate.name_contains("  "));
    }
}
