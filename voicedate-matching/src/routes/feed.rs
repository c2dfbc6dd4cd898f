use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use voicedate_shared::errors::{AppError, AppResult, ErrorCode};
use voicedate_shared::types::api::ApiResponse;
use voicedate_shared::types::auth::AuthUser;

use crate::feed::selector::{FeedCard, FeedPhase, FeedSession};
use crate::models::Profile;
use crate::routes::decisions::pass_key;
use crate::schema::profiles;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FeedStatus {
    pub phase: FeedPhase,
    pub position: usize,
    pub total: usize,
    pub empty: bool,
    pub card: Option<FeedCard>,
}

impl FeedStatus {
    fn from_session(session: &FeedSession) -> Self {
        Self {
            phase: session.phase(),
            position: session.position(),
            total: session.len(),
            empty: session.is_empty(),
            card: session.current().cloned(),
        }
    }
}

/// POST /feed/load - take a fresh snapshot of browsable profiles
pub async fn load_feed(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<FeedStatus>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let me = profiles::table
        .filter(profiles::user_id.eq(user.id))
        .first::<Profile>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    // Agent-ready candidates, excluding self, newest first.
    let candidates: Vec<Profile> = profiles::table
        .filter(profiles::agent_ready.eq(true))
        .filter(profiles::user_id.ne(user.id))
        .order(profiles::created_at.desc())
        .load::<Profile>(&mut conn)?;

    // Skip targets the viewer passed on recently (soft exclusion with TTL).
    let keys: Vec<String> = candidates
        .iter()
        .map(|c| pass_key(user.id, c.user_id))
        .collect();
    let passed = state.redis.exists_multi(&keys).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to check pass cooldowns, showing all candidates");
        vec![false; candidates.len()]
    });

    let visible: Vec<Profile> = candidates
        .into_iter()
        .zip(passed)
        .filter(|(_, was_passed)| !was_passed)
        .map(|(profile, _)| profile)
        .collect();

    let session = FeedSession::build(&me, &visible);
    tracing::info!(
        user_id = %user.id,
        candidates = visible.len(),
        feed_size = session.len(),
        "feed loaded"
    );

    let status = FeedStatus::from_session(&session);
    state.feeds.insert(user.id, session);

    Ok(Json(ApiResponse::ok(status)))
}

fn with_session<F>(state: &AppState, user_id: Uuid, f: F) -> AppResult<FeedStatus>
where
    F: FnOnce(&mut FeedSession),
{
    let mut entry = state
        .feeds
        .get_mut(&user_id)
        .ok_or_else(|| AppError::new(ErrorCode::FeedNotLoaded, "feed not loaded"))?;
    f(entry.value_mut());
    Ok(FeedStatus::from_session(entry.value()))
}

/// GET /feed/current - the card at the cursor
pub async fn current_card(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<FeedStatus>>> {
    let status = with_session(&state, user.id, |_| {})?;
    Ok(Json(ApiResponse::ok(status)))
}

/// POST /feed/advance - move the cursor forward one card
pub async fn advance_feed(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<FeedStatus>>> {
    let status = with_session(&state, user.id, FeedSession::advance)?;
    Ok(Json(ApiResponse::ok(status)))
}

/// POST /feed/reset - start over on the same snapshot
pub async fn reset_feed(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<FeedStatus>>> {
    let status = with_session(&state, user.id, FeedSession::reset)?;
    Ok(Json(ApiResponse::ok(status)))
}
