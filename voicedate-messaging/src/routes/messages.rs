use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use voicedate_shared::errors::{AppError, AppResult, ErrorCode};
use voicedate_shared::types::api::ApiResponse;
use voicedate_shared::types::auth::AuthUser;

use crate::events::publisher;
use crate::models::{Conversation, Message, NewMessage};
use crate::schema::{conversations, messages};
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Trim and validate message text. Whitespace-only content is rejected
/// before anything is written.
pub fn clean_content(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Does this message still owe the viewer's read receipt? Mirrors the
/// row selection of `mark_read`: only the other side's messages, and only
/// while `read_at` is null, so a receipt is set at most once.
fn awaiting_read_receipt(message: &Message, viewer: Uuid) -> bool {
    message.sender_id != viewer && message.read_at.is_none()
}

fn history_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT)
}

/// Fold the `limit + 1` query rows into one page: the extra row only
/// signals that an older page exists and is dropped.
fn into_history(mut rows: Vec<Message>, limit: i64) -> MessageHistory {
    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);
    MessageHistory {
        messages: rows,
        has_more,
    }
}

/// The global badge is the sum of the per-conversation counts; zero-count
/// conversations are dropped from the breakdown but never from the sum.
fn summarize_unread(counts: Vec<ConversationUnread>) -> UnreadCountResponse {
    let total_unread = counts.iter().map(|c| c.unread_count).sum();
    let conversations = counts.into_iter().filter(|c| c.unread_count > 0).collect();
    UnreadCountResponse {
        total_unread,
        conversations,
    }
}

// --- Request/response DTOs ---

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 2000, message = "message content too long"))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    /// Fetch messages strictly older than this timestamp (the oldest one
    /// already on screen).
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MessageHistory {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub total_unread: i64,
    pub conversations: Vec<ConversationUnread>,
}

#[derive(Debug, Serialize)]
pub struct ConversationUnread {
    pub conversation_id: Uuid,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub conversation_id: Uuid,
    pub marked_read: usize,
}

// --- Helpers ---

/// Load the conversation and verify the caller is one of its two members.
fn load_member_conversation(
    conn: &mut diesel::pg::PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<Conversation> {
    let conversation = conversations::table
        .find(conversation_id)
        .first::<Conversation>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ConversationNotFound, "conversation not found"))?;

    if !conversation.involves(user_id) {
        return Err(AppError::new(
            ErrorCode::NotConversationMember,
            "you are not a member of this conversation",
        ));
    }

    Ok(conversation)
}

// --- Handlers ---

/// GET /conversations/:id/messages - message history, newest first
///
/// Cursor pagination: pass `before` to fetch the next older page.
pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> AppResult<Json<ApiResponse<MessageHistory>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    load_member_conversation(&mut conn, conversation_id, auth_user.id)?;

    let limit = history_limit(params.limit);

    let mut query = messages::table
        .filter(messages::conversation_id.eq(conversation_id))
        .into_boxed();
    if let Some(before) = params.before {
        query = query.filter(messages::created_at.lt(before));
    }

    // One extra row tells us whether an older page exists.
    let rows: Vec<Message> = query
        .order(messages::created_at.desc())
        .limit(limit + 1)
        .load::<Message>(&mut conn)?;

    Ok(Json(ApiResponse::ok(into_history(rows, limit))))
}

/// POST /conversations/:id/messages - send a message
///
/// The response is the sender's source of truth (optimistic view); the
/// socket `new_message` event goes to the other member only, so the live
/// handler never double-inserts the author's own message.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let content = clean_content(&req.content).ok_or_else(|| {
        AppError::new(ErrorCode::EmptyMessage, "message content must not be empty")
    })?;

    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let conversation = load_member_conversation(&mut conn, conversation_id, auth_user.id)?;
    let recipient_id = conversation.partner_of(auth_user.id);

    let new_message = NewMessage {
        conversation_id,
        sender_id: auth_user.id,
        content,
    };

    let message: Message = diesel::insert_into(messages::table)
        .values(&new_message)
        .get_result(&mut conn)?;
    debug_assert!(awaiting_read_receipt(&message, recipient_id));

    diesel::update(conversations::table.find(conversation_id))
        .set(conversations::updated_at.eq(Utc::now()))
        .execute(&mut conn)?;

    let content_preview = message.content.chars().take(100).collect::<String>();
    publisher::publish_message_sent(
        &state.rabbitmq,
        message.id,
        conversation_id,
        auth_user.id,
        recipient_id,
        &content_preview,
    )
    .await;

    // Live delivery to the other member; the sender already has the message.
    let room = format!("user:{recipient_id}");
    let result = state.io.to(room).emit(
        "new_message",
        &serde_json::json!({
            "conversation_id": conversation_id,
            "message": message,
        }),
    );

    tracing::info!(
        sender = %auth_user.id,
        recipient = %recipient_id,
        conversation = %conversation_id,
        delivered = result.is_ok(),
        "message sent"
    );

    Ok(Json(ApiResponse::ok(message)))
}

/// POST /conversations/:id/read - mark the other side's messages read
///
/// The update filter matches `awaiting_read_receipt`: only null `read_at`
/// rows are touched, so a receipt is monotonic — once set it is never
/// reset or moved.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MarkReadResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;

    let conversation = load_member_conversation(&mut conn, conversation_id, auth_user.id)?;

    let marked_read = diesel::update(
        messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(messages::sender_id.ne(auth_user.id))
            .filter(messages::read_at.is_null()),
    )
    .set(messages::read_at.eq(Utc::now()))
    .execute(&mut conn)?;

    // Let the other side's open chat flip its receipts.
    if marked_read > 0 {
        let partner_id = conversation.partner_of(auth_user.id);
        let room = format!("user:{partner_id}");
        let _ = state.io.to(room).emit(
            "conversation_read",
            &serde_json::json!({
                "conversation_id": conversation_id,
                "reader_id": auth_user.id,
            }),
        );
    }

    Ok(Json(ApiResponse::ok(MarkReadResponse {
        conversation_id,
        marked_read,
    })))
}

/// GET /unread-count - global unread badge plus the per-conversation split
pub async fn get_unread_count(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::Internal(e.into()))?;
    let user_id = auth_user.id;

    let conv_ids: Vec<Uuid> = conversations::table
        .filter(conversations::user_a.eq(user_id).or(conversations::user_b.eq(user_id)))
        .select(conversations::id)
        .load::<Uuid>(&mut conn)?;

    let mut counts = Vec::with_capacity(conv_ids.len());
    for conv_id in conv_ids {
        let unread: i64 = messages::table
            .filter(messages::conversation_id.eq(conv_id))
            .filter(messages::sender_id.ne(user_id))
            .filter(messages::read_at.is_null())
            .select(count_star())
            .first::<i64>(&mut conn)?;

        counts.push(ConversationUnread {
            conversation_id: conv_id,
            unread_count: unread,
        });
    }

    Ok(Json(ApiResponse::ok(summarize_unread(counts))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Uuid, read_at: Option<DateTime<Utc>>) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: sender,
            content: "hello".into(),
            created_at: Utc::now(),
            read_at,
        }
    }

    fn unread(count: i64) -> ConversationUnread {
        ConversationUnread {
            conversation_id: Uuid::new_v4(),
            unread_count: count,
        }
    }

    #[test]
    fn clean_content_trims() {
        assert_eq!(clean_content("  hi there  ").as_deref(), Some("hi there"));
    }

    #[test]
    fn clean_content_rejects_whitespace_only() {
        assert!(clean_content("").is_none());
        assert!(clean_content("   ").is_none());
        assert!(clean_content("\n\t ").is_none());
    }

    #[test]
    fn oversized_content_fails_validation() {
        let req = SendMessageRequest {
            content: "x".repeat(2001),
        };
        assert!(req.validate().is_err());

        let ok = SendMessageRequest {
            content: "x".repeat(2000),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn read_receipts_are_monotonic() {
        let partner = Uuid::new_v4();
        let reader = Uuid::new_v4();

        let mut msg = message(partner, None);
        assert!(awaiting_read_receipt(&msg, reader));

        // Once read, a second pass selects nothing, so the original
        // receipt time stands.
        msg.read_at = Some(Utc::now());
        assert!(!awaiting_read_receipt(&msg, reader));
    }

    #[test]
    fn own_messages_never_owe_receipts() {
        let me = Uuid::new_v4();
        let msg = message(me, None);
        assert!(!awaiting_read_receipt(&msg, me));
    }

    #[test]
    fn per_conversation_unread_sums_to_total() {
        let resp = summarize_unread(vec![unread(3), unread(0), unread(2)]);
        assert_eq!(resp.total_unread, 5);
        assert_eq!(resp.conversations.len(), 2);
        let breakdown: i64 = resp.conversations.iter().map(|c| c.unread_count).sum();
        assert_eq!(breakdown, resp.total_unread);
    }

    #[test]
    fn no_unread_means_zero_badge() {
        let resp = summarize_unread(vec![unread(0), unread(0)]);
        assert_eq!(resp.total_unread, 0);
        assert!(resp.conversations.is_empty());
    }

    #[test]
    fn history_limit_defaults_and_clamps() {
        assert_eq!(history_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(Some(10)), 10);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(500)), MAX_HISTORY_LIMIT);
    }

    #[test]
    fn extra_row_signals_older_page() {
        let sender = Uuid::new_v4();
        let rows: Vec<Message> = (0..3).map(|_| message(sender, None)).collect();

        let page = into_history(rows.clone(), 2);
        assert!(page.has_more);
        assert_eq!(page.messages.len(), 2);

        let last_page = into_history(rows, 3);
        assert!(!last_page.has_more);
        assert_eq!(last_page.messages.len(), 3);
    }
}
