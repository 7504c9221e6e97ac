use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
}

impl Meal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Meal::Breakfast => "breakfast",
            Meal::Lunch => "lunch",
            Meal::Dinner => "dinner",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Some(Meal::Breakfast),
            "lunch" => Some(Meal::Lunch),
            "dinner" => Some(Meal::Dinner),
            _ => None,
        }
    }
}

/// Append-only record of one check-in at the food/attendance desk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinEvent {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub meals: Vec<Meal>,
    pub dietary_notes: Option<String>,
    pub staff_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CheckinRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub meals: Vec<String>,
    pub dietary_notes: Option<String>,
    pub staff_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<CheckinRow> for CheckinEvent {
    fn from(row: CheckinRow) -> Self {
        CheckinEvent {
            id: row.id,
            profile_id: row.profile_id,
            meals: row.meals.iter().filter_map(|m| Meal::parse(m)).collect(),
            dietary_notes: row.dietary_notes,
            staff_id: row.staff_id,
            created_at: row.created_at,
        }
    }
}
