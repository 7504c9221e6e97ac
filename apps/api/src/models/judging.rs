use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-criterion scores on the fixed 0–10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionScores {
    pub innovation: u8,
    pub technical: u8,
    pub design: u8,
    pub impact: u8,
    pub presentation: u8,
}

impl CriterionScores {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u8)> {
        [
            ("innovation", self.innovation),
            ("technical", self.technical),
            ("design", self.design),
            ("impact", self.impact),
            ("presentation", self.presentation),
        ]
        .into_iter()
    }
}

/// One judge's evaluation of one project. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgingScoreEntry {
    pub id: Uuid,
    pub project_title: String,
    #[serde(flatten)]
    pub scores: CriterionScores,
    pub total: f64,
    pub comments: Option<String>,
    pub judge_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct JudgingScoreRow {
    pub id: Uuid,
    pub project_title: String,
    pub innovation: i16,
    pub technical: i16,
    pub design: i16,
    pub impact: i16,
    pub presentation: i16,
    pub total: f64,
    pub comments: Option<String>,
    pub judge_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<JudgingScoreRow> for JudgingScoreEntry {
    fn from(row: JudgingScoreRow) -> Self {
        let clamp = |v: i16| v.clamp(0, 10) as u8;
        JudgingScoreEntry {
            id: row.id,
            project_title: row.project_title,
            scores: CriterionScores {
                innovation: clamp(row.innovation),
                technical: clamp(row.technical),
                design: clamp(row.design),
                impact: clamp(row.impact),
                presentation: clamp(row.presentation),
            },
            total: row.total,
            comments: row.comments,
            judge_id: row.judge_id,
            created_at: row.created_at,
        }
    }
}
