use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{AuthIdentity, ProfileRecord};
use crate::reconcile::enrichment::{sync_profile_from_registration, SyncOutcome};
use crate::state::AppState;
use crate::teammates::{join_teammates, split_teammates};

#[derive(Deserialize)]
pub struct TeammatesUpdate {
    pub teammates: String,
}

/// POST /api/v1/auth/sync
/// Called after sign-in. Always 200; the outcome (including skips) is in the body.
pub async fn handle_auth_sync(
    State(state): State<AppState>,
    Json(identity): Json<AuthIdentity>,
) -> Json<SyncOutcome> {
    Json(sync_profile_from_registration(state.store.as_ref(), &identity).await)
}

/// GET /api/v1/profiles/:id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileRecord>, AppError> {
    let profile = state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {id}")))?;
    Ok(Json(profile))
}

/// PATCH /api/v1/profiles/:id/teammates
pub async fn handle_update_teammates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TeammatesUpdate>,
) -> Result<Json<ProfileRecord>, AppError> {
    let entries = split_teammates(&req.teammates);
    let joined = join_teammates(entries.iter().map(String::as_str));
    let value = (!joined.is_empty()).then_some(joined.as_str());

    if !state.store.set_teammates(id, value).await? {
        return Err(AppError::NotFound(format!("profile {id}")));
    }
    let profile = state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {id}")))?;
    Ok(Json(profile))
}
