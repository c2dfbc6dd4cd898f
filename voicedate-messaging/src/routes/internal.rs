use axum::extract::State;
use axum::Json;
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use voicedate_shared::errors::{AppError, AppResult};

use crate::models::Conversation;
use crate::routes::conversations::canonical_pair;
use crate::schema::{conversations, messages};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchConversationsRequest {
    pub user_id: Uuid,
    pub partner_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ConversationInfo {
    pub partner_id: Uuid,
    pub conversation_id: Uuid,
    pub unread_count: i64,
}

/// POST /internal/conversations/batch - conversation ids and unread counts
/// for a user against a set of partners.
///
/// Service-to-service endpoint; matching calls it to enrich match
/// summaries. Pairs with no conversation yet are simply absent from the
/// response.
pub async fn batch_conversations(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchConversationsRequest>,
) -> AppResult<Json<Vec<ConversationInfo>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let mut infos = Vec::with_capacity(req.partner_ids.len());

    for partner_id in &req.partner_ids {
        let (user_a, user_b) = canonical_pair(req.user_id, *partner_id);

        let conversation = conversations::table
            .filter(conversations::user_a.eq(user_a))
            .filter(conversations::user_b.eq(user_b))
            .first::<Conversation>(&mut conn)
            .optional()?;

        let Some(conversation) = conversation else {
            continue;
        };

        let unread: i64 = messages::table
            .filter(messages::conversation_id.eq(conversation.id))
            .filter(messages::sender_id.ne(req.user_id))
            .filter(messages::read_at.is_null())
            .select(count_star())
            .first::<i64>(&mut conn)?;

        infos.push(ConversationInfo {
            partner_id: *partner_id,
            conversation_id: conversation.id,
            unread_count: unread,
        });
    }

    Ok(Json(infos))
}
