use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::profile::TeammateCandidate;
use crate::state::AppState;
use crate::teammates::{TeammateResolver, TeammateToken, TokenStatus};

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub status: TokenStatus,
    pub candidates: Vec<TeammateCandidate>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub teammates: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub teammates: String,
    pub tokens: Vec<TeammateToken>,
    /// False when the lookup failed and every token is still `unknown`.
    pub resolved: bool,
}

/// GET /api/v1/teammates/search?q=
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Err(AppError::Validation("q must not be empty".to_string()));
    }
    let resolver = TeammateResolver::new(state.store.clone(), state.resolver_config());
    let (status, candidates) = resolver.search(&query).await?;
    Ok(Json(SearchResponse {
        query,
        status,
        candidates,
    }))
}

/// POST /api/v1/teammates/status
pub async fn handle_status(
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let resolver =
        TeammateResolver::with_text(state.store.clone(), state.resolver_config(), &req.teammates);
    let resolved = resolver.refresh_statuses().await;
    Ok(Json(StatusResponse {
        teammates: resolver.joined(),
        tokens: resolver.tokens(),
        resolved,
    }))
}
