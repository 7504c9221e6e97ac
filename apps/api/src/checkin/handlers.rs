use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::checkin::{list_history, record_checkin, CheckinRequest};
use crate::errors::AppError;
use crate::models::checkin::CheckinEvent;
use crate::state::AppState;

/// POST /api/v1/checkins
pub async fn handle_checkin(
    State(state): State<AppState>,
    Json(req): Json<CheckinRequest>,
) -> Result<(StatusCode, Json<CheckinEvent>), AppError> {
    let event = record_checkin(state.store.as_ref(), &req).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/v1/profiles/:id/checkins
pub async fn handle_checkin_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CheckinEvent>>, AppError> {
    Ok(Json(list_history(state.store.as_ref(), id).await?))
}
