use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use voicedate_shared::errors::{AppError, AppResult, ErrorCode};
use voicedate_shared::types::api::ApiResponse;
use voicedate_shared::types::auth::AuthUser;

use crate::events::publisher;
use crate::feed::selector::FeedCard;
use crate::models::{Like, NewLike, Profile};
use crate::schema::{likes, profiles};
use crate::AppState;

/// Redis key marking a recent "no" on (viewer, target). TTL-scoped so a
/// pass hides the profile from upcoming feed loads without a durable edge.
pub fn pass_key(viewer: Uuid, target: Uuid) -> String {
    format!("feed:passed:{viewer}:{target}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Yes,
    No,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub target_id: Uuid,
    pub decision: Decision,
    /// Whole seconds of voice-call time with this profile's agent since
    /// the last decision; the session layer computes it, we just add it up.
    #[serde(default)]
    pub call_duration_secs: i32,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_profile: Option<FeedCard>,
}

#[derive(Debug, PartialEq, Eq)]
struct LikeEffects {
    /// The edge existed before this decision; duration was added to it.
    accumulated: bool,
    /// Total seconds on the directed edge after the upsert.
    total_secs: i32,
    /// Announce `match.created` only when this call's like is the new one.
    /// A repeat yes on an already-matched pair accumulates duration but
    /// must not notify both users again.
    announce_match: bool,
}

/// What a yes decision does to the edges around it. Split out of the
/// handler so the accumulate/announce rules are testable without a
/// database.
fn evaluate_like(prior: Option<&Like>, reverse: Option<&Like>, added_secs: i32) -> LikeEffects {
    let prior_secs = prior.map(|l| l.call_duration_secs).unwrap_or(0);
    LikeEffects {
        accumulated: prior.is_some(),
        total_secs: prior_secs + added_secs,
        announce_match: prior.is_none() && reverse.is_some(),
    }
}

/// POST /decisions - record a swipe decision, detect a mutual match
///
/// "yes" writes the like as an atomic insert-or-accumulate, so repeat
/// decisions on the same target add call time to the single existing edge
/// instead of duplicating it, and then checks the reverse edge. A failure
/// anywhere surfaces to the caller with the feed cursor untouched; only a
/// completed decision advances it.
pub async fn record_decision(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<ApiResponse<DecisionResponse>>> {
    if req.call_duration_secs < 0 {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "call_duration_secs must be non-negative",
        ));
    }
    if req.target_id == user.id {
        return Err(AppError::new(ErrorCode::CannotLikeSelf, "cannot decide on yourself"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let target = profiles::table
        .filter(profiles::user_id.eq(req.target_id))
        .first::<Profile>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "target profile not found"))?;

    if req.decision == Decision::No {
        // No durable edge for a pass; a TTL key keeps the profile out of
        // upcoming feed loads for a while.
        let key = pass_key(user.id, req.target_id);
        if let Err(e) = state.redis.set(&key, "1", state.config.pass_cooldown_secs).await {
            tracing::warn!(error = %e, "failed to set pass cooldown");
        }
        advance_feed_cursor(&state, user.id);

        return Ok(Json(ApiResponse::ok(DecisionResponse {
            matched: false,
            matched_profile: None,
        })));
    }

    // Prior edge, if any. The write below is a single atomic upsert either
    // way; this read decides whether a resulting match is new or a repeat.
    let existing: Option<Like> = likes::table
        .filter(likes::from_user_id.eq(user.id))
        .filter(likes::to_user_id.eq(req.target_id))
        .first::<Like>(&mut conn)
        .optional()?;

    let new_like = NewLike {
        from_user_id: user.id,
        to_user_id: req.target_id,
        call_duration_secs: req.call_duration_secs,
    };

    // Insert-or-accumulate: one row per directed pair, duration summed in
    // the database so concurrent calls cannot drop each other's time.
    let like: Like = diesel::insert_into(likes::table)
        .values(&new_like)
        .on_conflict((likes::from_user_id, likes::to_user_id))
        .do_update()
        .set(likes::call_duration_secs.eq(likes::call_duration_secs + req.call_duration_secs))
        .get_result::<Like>(&mut conn)?;

    // Reverse edge check. A query error propagates as an error here; it
    // must never be read as "no match".
    let reverse: Option<Like> = likes::table
        .filter(likes::from_user_id.eq(req.target_id))
        .filter(likes::to_user_id.eq(user.id))
        .first::<Like>(&mut conn)
        .optional()?;

    let effects = evaluate_like(existing.as_ref(), reverse.as_ref(), req.call_duration_secs);

    publisher::publish_like_recorded(
        &state.rabbitmq,
        user.id,
        req.target_id,
        req.call_duration_secs,
        effects.accumulated,
    )
    .await;

    tracing::debug!(
        from = %user.id,
        to = %req.target_id,
        total_call_secs = effects.total_secs,
        "like stored"
    );

    let response = if let Some(reverse) = &reverse {
        if effects.announce_match {
            let me = profiles::table
                .filter(profiles::user_id.eq(user.id))
                .first::<Profile>(&mut conn)
                .optional()?
                .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

            // The second like's timestamp is the match time.
            let matched_at = like.created_at.max(reverse.created_at);

            tracing::info!(
                user_a = %user.id,
                user_b = %req.target_id,
                matched_at = %matched_at,
                "mutual like detected"
            );

            publisher::publish_match_created(
                &state.rabbitmq,
                user.id,
                req.target_id,
                &me.display_name,
                &target.display_name,
                matched_at,
            )
            .await;
        }

        DecisionResponse {
            matched: true,
            matched_profile: Some(FeedCard::from_profile(&target)),
        }
    } else {
        DecisionResponse {
            matched: false,
            matched_profile: None,
        }
    };

    advance_feed_cursor(&state, user.id);

    Ok(Json(ApiResponse::ok(response)))
}

/// Move the viewer's feed session forward, if one is loaded. Decisions can
/// also arrive without an active feed (e.g. from a match detail screen).
fn advance_feed_cursor(state: &AppState, user_id: Uuid) {
    if let Some(mut session) = state.feeds.get_mut(&user_id) {
        session.value_mut().advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn like(from: Uuid, to: Uuid, secs: i32) -> Like {
        Like {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            call_duration_secs: secs,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn repeat_yes_accumulates_into_one_edge() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let effects = evaluate_like(Some(&like(a, b, 30)), None, 45);
        assert!(effects.accumulated);
        assert_eq!(effects.total_secs, 75);
    }

    #[test]
    fn first_like_is_a_fresh_edge() {
        let effects = evaluate_like(None, None, 30);
        assert!(!effects.accumulated);
        assert_eq!(effects.total_secs, 30);
        assert!(!effects.announce_match);
    }

    #[test]
    fn match_is_announced_only_once() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let reverse = like(b, a, 90);

        // B already liked A; A's first yes completes the pair.
        let first = evaluate_like(None, Some(&reverse), 120);
        assert!(first.announce_match);

        // A's repeat yes adds duration but must not re-announce: both
        // users already saw the match.
        let repeat = evaluate_like(Some(&like(a, b, 120)), Some(&reverse), 45);
        assert!(repeat.accumulated);
        assert!(!repeat.announce_match);
        assert_eq!(repeat.total_secs, 165);
    }
}
