// Judging Console
// Admin judges score projects on five weighted criteria; entries are
// append-only and summarized per project.

pub mod aggregate;
pub mod handlers;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::judging::aggregate::{weighted_total, MAX_SCORE};
use crate::models::judging::{CriterionScores, JudgingScoreEntry};
use crate::store::AttendeeStore;

pub use aggregate::{project_key, summarize, ProjectSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
    pub judge_id: Uuid,
    pub project_title: String,
    #[serde(flatten)]
    pub scores: CriterionScores,
    #[serde(default)]
    pub comments: Option<String>,
}

pub async fn submit_score(
    store: &dyn AttendeeStore,
    req: &ScoreRequest,
) -> Result<JudgingScoreEntry, AppError> {
    let judge = store.get_profile(req.judge_id).await?;
    if !judge.is_some_and(|j| j.is_admin) {
        return Err(AppError::Forbidden);
    }

    let title = req.project_title.trim();
    if title.is_empty() {
        return Err(AppError::Validation(
            "project_title must not be empty".to_string(),
        ));
    }
    if let Some((name, score)) = req.scores.iter().find(|(_, s)| *s > MAX_SCORE) {
        return Err(AppError::Validation(format!(
            "{name} must be between 0 and {MAX_SCORE}, got {score}"
        )));
    }

    let entry = JudgingScoreEntry {
        id: Uuid::new_v4(),
        project_title: title.to_string(),
        scores: req.scores,
        total: weighted_total(&req.scores),
        comments: req
            .comments
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        judge_id: req.judge_id,
        created_at: Utc::now(),
    };
    store.insert_score(&entry).await?;
    info!(
        "Score {:.2} recorded for '{}' by {}",
        entry.total, entry.project_title, entry.judge_id
    );
    Ok(entry)
}

pub async fn project_summaries(
    store: &dyn AttendeeStore,
) -> Result<Vec<ProjectSummary>, AppError> {
    let entries = store.list_scores().await?;
    Ok(summarize(&entries))
}
