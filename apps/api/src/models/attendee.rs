use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identifier handed to us by the form provider.
///
/// Pure-digit strings are held as numbers so they compare and serialize the way a
/// numeric column would; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Numeric(i64),
    Text(String),
}

impl ExternalId {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<i64>() {
                return Some(ExternalId::Numeric(n));
            }
        }
        Some(ExternalId::Text(trimmed.to_string()))
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::Numeric(n) => write!(f, "{n}"),
            ExternalId::Text(s) => f.write_str(s),
        }
    }
}

/// Canonical registration data for one person. Every field is optional; a record
/// with nothing but a submission id is still persistable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub submission_id: Option<ExternalId>,
    pub respondent_id: Option<ExternalId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
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
}

impl AttendeeRecord {
    /// Lower-cased, trimmed email used for cross-table matching.
    pub fn email_key(&self) -> Option<String> {
        self.email_address
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }

    /// `display_name` when present, otherwise "first last".
    pub fn full_name(&self) -> Option<String> {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return Some(name.trim().to_string());
        }
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }
}

/// Row shape of the `attendees` table. Ids are stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct AttendeeRow {
    pub submission_id: Option<String>,
    pub respondent_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
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
}

impl From<AttendeeRow> for AttendeeRecord {
    fn from(row: AttendeeRow) -> Self {
        AttendeeRecord {
            submission_id: row.submission_id.as_deref().and_then(ExternalId::parse),
            respondent_id: row.respondent_id.as_deref().and_then(ExternalId::parse),
            submitted_at: row.submitted_at,
            first_name: row.first_name,
            last_name: row.last_name,
            display_name: row.display_name,
            email_address: row.email_address,
            phone_number: row.phone_number,
            date_of_birth: row.date_of_birth,
            school: row.school,
            grade: row.grade,
            city: row.city,
            parent_name: row.parent_name,
            parent_email: row.parent_email,
            parent_phone: row.parent_phone,
            participating_solo: row.participating_solo,
            looking_for_teammates: row.looking_for_teammates,
            teammates: row.teammates,
            is_vegetarian: row.is_vegetarian,
            allergies: row.allergies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_digits_become_numeric() {
        assert_eq!(ExternalId::parse(" 12345 "), Some(ExternalId::Numeric(12345)));
    }

    #[test]
    fn test_external_id_text_preserved() {
        assert_eq!(
            ExternalId::parse("mO8xYz"),
            Some(ExternalId::Text("mO8xYz".to_string()))
        );
    }

    #[test]
    fn test_external_id_empty_is_none() {
        assert_eq!(ExternalId::parse("   "), None);
        assert_eq!(ExternalId::parse(""), None);
    }

    #[test]
    fn test_full_name_prefers_display_name() {
        let record = AttendeeRecord {
            display_name: Some("Jay D".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            ..Default::default()
        };
        assert_eq!(record.full_name().as_deref(), Some("Jay D"));
    }

    #[test]
    fn test_full_name_joins_parts() {
        let record = AttendeeRecord {
            first_name: Some("Jane".to_string()),
            last_name: None,
            ..Default::default()
        };
        assert_eq!(record.full_name().as_deref(), Some("Jane"));
        assert_eq!(AttendeeRecord::default().full_name(), None);
    }
}
