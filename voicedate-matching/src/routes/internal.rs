use axum::extract::{Query, State};
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use voicedate_shared::errors::{AppError, AppResult};

use crate::models::Profile;
use crate::schema::{likes, profiles};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckMatchParams {
    pub user_a: Uuid,
    pub user_b: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckMatchResponse {
    pub matched: bool,
}

/// GET /internal/matches/check - do both directed likes exist for this pair?
///
/// Service-to-service endpoint; messaging calls it before lazily creating
/// a conversation.
pub async fn check_match(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckMatchParams>,
) -> AppResult<Json<CheckMatchResponse>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let edges: i64 = likes::table
        .filter(
            likes::from_user_id
                .eq(params.user_a)
                .and(likes::to_user_id.eq(params.user_b))
                .or(likes::from_user_id
                    .eq(params.user_b)
                    .and(likes::to_user_id.eq(params.user_a))),
        )
        .count()
        .get_result(&mut conn)?;

    Ok(Json(CheckMatchResponse { matched: edges >= 2 }))
}

#[derive(Debug, Deserialize)]
pub struct BatchProfilesRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub user_id: Uuid,
    pub display_name: String,
    pub profile_photo: Option<String>,
    pub agent_ready: bool,
}

/// POST /internal/profiles/batch - lightweight profile lookup for other services
pub async fn batch_profiles(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchProfilesRequest>,
) -> AppResult<Json<Vec<ProfileSummary>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let rows: Vec<Profile> = profiles::table
        .filter(profiles::user_id.eq_any(&req.user_ids))
        .load::<Profile>(&mut conn)?;

    let summaries = rows
        .into_iter()
        .map(|p| ProfileSummary {
            user_id: p.user_id,
            display_name: p.display_name,
            profile_photo: p.profile_photo_url,
            agent_ready: p.agent_ready,
        })
        .collect();

    Ok(Json(summaries))
}
