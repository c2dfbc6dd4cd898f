use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use voicedate_shared::errors::{AppError, AppResult, ErrorCode};
use voicedate_shared::types::api::ApiResponse;
use voicedate_shared::types::auth::AuthUser;

use crate::events::publisher;
use crate::models::{Conversation, Message, NewConversation};
use crate::schema::{conversations, messages};
use crate::AppState;

/// Order a user pair canonically (ascending) so the unordered pair maps to
/// exactly one (user_a, user_b) row.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct ConversationPreview {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub partner_name: Option<String>,
    pub partner_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

// --- Handlers ---

/// POST /conversations/with/:partner_id - open (or lazily create) the one
/// conversation for a matched pair
///
/// Conversations only exist between matched users, so this first verifies
/// the mutual like with the matching service. Creation is duplicate-safe:
/// the pair is stored in canonical order and a concurrent insert from the
/// other side coalesces via ON CONFLICT DO NOTHING plus a re-select.
pub async fn get_or_create_conversation(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Conversation>>> {
    if partner_id == auth_user.id {
        return Err(AppError::bad_request("cannot open a conversation with yourself"));
    }

    verify_matched(&state, auth_user.id, partner_id).await?;

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;
    let (user_a, user_b) = canonical_pair(auth_user.id, partner_id);

    if let Some(existing) = find_conversation(&mut conn, user_a, user_b)? {
        return Ok(Json(ApiResponse::ok(existing)));
    }

    let inserted = diesel::insert_into(conversations::table)
        .values(&NewConversation { user_a, user_b })
        .on_conflict((conversations::user_a, conversations::user_b))
        .do_nothing()
        .execute(&mut conn)?;

    // Re-select either way: on a lost race the other side's row wins.
    let conversation = find_conversation(&mut conn, user_a, user_b)?
        .ok_or_else(|| AppError::new(ErrorCode::ConversationNotFound, "conversation not found after create"))?;

    if inserted > 0 {
        tracing::info!(
            conversation_id = %conversation.id,
            user_a = %user_a,
            user_b = %user_b,
            "conversation created"
        );
        publisher::publish_conversation_created(&state.rabbitmq, conversation.id, user_a, user_b).await;
    }

    Ok(Json(ApiResponse::ok(conversation)))
}

pub(crate) fn find_conversation(
    conn: &mut diesel::pg::PgConnection,
    user_a: Uuid,
    user_b: Uuid,
) -> AppResult<Option<Conversation>> {
    let conversation = conversations::table
        .filter(conversations::user_a.eq(user_a))
        .filter(conversations::user_b.eq(user_b))
        .first::<Conversation>(conn)
        .optional()?;
    Ok(conversation)
}

/// Ask the matching service whether both directed likes exist. A transport
/// failure propagates as unavailable rather than reading as "not matched".
async fn verify_matched(state: &AppState, me: Uuid, partner: Uuid) -> AppResult<()> {
    let url = format!("{}/internal/matches/check", state.config.matching_service_url);

    #[derive(serde::Deserialize)]
    struct CheckMatchResponse {
        matched: bool,
    }

    let resp = state
        .http_client
        .get(&url)
        .query(&[("user_a", me.to_string()), ("user_b", partner.to_string())])
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "match check request failed");
            AppError::new(ErrorCode::ServiceUnavailable, "could not verify match")
        })?;

    let check: CheckMatchResponse = resp.json().await.map_err(|e| {
        tracing::error!(error = %e, "match check returned malformed response");
        AppError::new(ErrorCode::ServiceUnavailable, "could not verify match")
    })?;

    if !check.matched {
        return Err(AppError::new(
            ErrorCode::NotMatched,
            "conversations are only available after a mutual match",
        ));
    }

    Ok(())
}

/// GET /conversations - the caller's conversations with last message
/// preview and unread count, most recent activity first
pub async fn list_conversations(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ConversationPreview>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;
    let user_id = auth_user.id;

    let convs: Vec<Conversation> = conversations::table
        .filter(conversations::user_a.eq(user_id).or(conversations::user_b.eq(user_id)))
        .load::<Conversation>(&mut conn)?;

    if convs.is_empty() {
        return Ok(Json(ApiResponse::ok(vec![])));
    }

    let mut previews = Vec::with_capacity(convs.len());
    for conv in convs {
        let last_msg: Option<Message> = messages::table
            .filter(messages::conversation_id.eq(conv.id))
            .order(messages::created_at.desc())
            .first::<Message>(&mut conn)
            .optional()?;

        let unread: i64 = messages::table
            .filter(messages::conversation_id.eq(conv.id))
            .filter(messages::sender_id.ne(user_id))
            .filter(messages::read_at.is_null())
            .select(count_star())
            .first::<i64>(&mut conn)?;

        previews.push(ConversationPreview {
            id: conv.id,
            partner_id: conv.partner_of(user_id),
            partner_name: None,
            partner_photo: None,
            created_at: conv.created_at,
            last_message_time: last_msg.as_ref().map(|m| m.created_at),
            last_message: last_msg.map(|m| m.content),
            unread_count: unread,
        });
    }

    enrich_partners(&state, &mut previews).await;

    previews.sort_by(|a, b| {
        let a_time = a.last_message_time.unwrap_or(a.created_at);
        let b_time = b.last_message_time.unwrap_or(b.created_at);
        b_time.cmp(&a_time)
    });

    Ok(Json(ApiResponse::ok(previews)))
}

/// Fill partner display names/photos from the matching service's internal
/// profile endpoint; a failure leaves the previews bare.
async fn enrich_partners(state: &AppState, previews: &mut [ConversationPreview]) {
    let partner_ids: Vec<Uuid> = previews.iter().map(|p| p.partner_id).collect();
    if partner_ids.is_empty() {
        return;
    }

    #[derive(serde::Deserialize)]
    struct ProfileSummary {
        user_id: Uuid,
        display_name: String,
        profile_photo: Option<String>,
    }

    let url = format!("{}/internal/profiles/batch", state.config.matching_service_url);
    let profiles: Vec<ProfileSummary> = match state
        .http_client
        .post(&url)
        .json(&serde_json::json!({ "user_ids": partner_ids }))
        .send()
        .await
    {
        Ok(resp) => resp.json().await.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch partner profiles from matching");
            vec![]
        }
    };

    let by_user: HashMap<Uuid, ProfileSummary> =
        profiles.into_iter().map(|p| (p.user_id, p)).collect();

    for preview in previews.iter_mut() {
        if let Some(profile) = by_user.get(&preview.partner_id) {
            preview.partner_name = Some(profile.display_name.clone());
            preview.partner_photo = profile.profile_photo.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
    }

    #[test]
    fn canonical_pair_is_ascending() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = canonical_pair(a, b);
        assert!(first < second);
    }

    #[test]
    fn partner_of_returns_the_other_side() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (user_a, user_b) = canonical_pair(a, b);
        let conv = Conversation {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conv.partner_of(a), b);
        assert_eq!(conv.partner_of(b), a);
        assert!(conv.involves(a) && conv.involves(b));
        assert!(!conv.involves(Uuid::new_v4()));
    }
}
