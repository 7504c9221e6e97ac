use axum::{extract::State, http::StatusCode, Json};

use crate::errors::AppError;
use crate::judging::{project_summaries, submit_score, ProjectSummary, ScoreRequest};
use crate::models::judging::JudgingScoreEntry;
use crate::state::AppState;

/// POST /api/v1/judging/scores
pub async fn handle_submit_score(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<(StatusCode, Json<JudgingScoreEntry>), AppError> {
    let entry = submit_score(state.store.as_ref(), &req).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/v1/judging/summary
pub async fn handle_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectSummary>>, AppError> {
    Ok(Json(project_summaries(state.store.as_ref()).await?))
}
