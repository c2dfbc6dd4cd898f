use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::{Data, SocketRef};
use uuid::Uuid;

use crate::routes::conversations::{canonical_pair, find_conversation};
use crate::AppState;

const PRESENCE_TTL_SECS: u64 = 120;

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}

fn presence_key(user_id: Uuid) -> String {
    format!("online:{user_id}")
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let user_id = match authenticate_socket(&socket, &state) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(error = %msg, "messaging socket auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "AUTH_FAILED".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    // Store user_id in socket extensions
    socket.extensions.insert(user_id);

    // Join user-specific room so new_message / match_found can be pushed
    let user_room = format!("user:{user_id}");
    socket.join(user_room).ok();

    tracing::info!(user_id = %user_id, sid = %socket.id, "messaging socket connected");

    let _ = state.redis.set(&presence_key(user_id), "1", PRESENCE_TTL_SECS).await;

    let _ = socket.emit("connected", &serde_json::json!({ "user_id": user_id }));

    // Typing indicator relay: forwarded to the partner, never persisted
    socket.on("typing", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(payload)| {
            let state = state.clone();
            async move { on_typing(socket, payload, &state).await; }
        }
    });

    // Heartbeat handler - refresh presence TTL
    socket.on("heartbeat", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                if let Some(user_id) = get_user_id(&socket) {
                    let _ = state.redis.set(&presence_key(user_id), "1", PRESENCE_TTL_SECS).await;
                }
            }
        }
    });

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                on_disconnect_with_state(socket, state).await;
            }
        }
    });
}

async fn on_disconnect_with_state(socket: SocketRef, state: Arc<AppState>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    tracing::info!(user_id = %user_id, sid = %socket.id, "messaging socket disconnected");

    let _ = state.redis.del(&presence_key(user_id)).await;
}

fn parse_typing_target(payload: &serde_json::Value) -> Option<Uuid> {
    payload
        .get("to")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Relay a typing indicator, but only inside an existing conversation:
/// an arbitrary user id in `to` is not reachable this way.
async fn on_typing(socket: SocketRef, payload: serde_json::Value, state: &Arc<AppState>) {
    let user_id = match get_user_id(&socket) {
        Some(id) => id,
        None => return,
    };

    let Some(to) = parse_typing_target(&payload) else {
        tracing::warn!("typing event missing or invalid 'to' field");
        return;
    };

    let conversation = {
        let mut conn = match state.db.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "db pool unavailable for typing relay");
                return;
            }
        };
        let (user_a, user_b) = canonical_pair(user_id, to);
        match find_conversation(&mut conn, user_a, user_b) {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                tracing::debug!(from = %user_id, to = %to, "typing relay dropped, no shared conversation");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "typing relay conversation lookup failed");
                return;
            }
        }
    };

    let partner_room = format!("user:{to}");
    let _ = socket.to(partner_room).emit(
        "typing",
        &serde_json::json!({
            "from": user_id,
            "conversation_id": conversation.id,
        }),
    );
}

fn authenticate_socket(socket: &SocketRef, state: &Arc<AppState>) -> Result<Uuid, String> {
    let connect_info = socket.req_parts();

    // Extract token from query string ?token=xxx
    let query = connect_info.uri.query().unwrap_or_default();
    let token = query
        .split('&')
        .find_map(|pair| {
            let mut split = pair.splitn(2, '=');
            let key = split.next()?;
            let value = split.next()?;
            if key == "token" {
                Some(value.to_string())
            } else {
                None
            }
        })
        .ok_or_else(|| "missing token query parameter".to_string())?;

    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = jsonwebtoken::decode::<voicedate_shared::types::auth::Claims>(
        &token,
        &jsonwebtoken::DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("invalid token: {e}"))?;

    if token_data.claims.is_expired() {
        return Err("token has expired".into());
    }

    Ok(token_data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_target_parses_valid_uuid() {
        let to = Uuid::new_v4();
        let payload = serde_json::json!({ "to": to.to_string() });
        assert_eq!(parse_typing_target(&payload), Some(to));
    }

    #[test]
    fn typing_target_rejects_missing_or_malformed() {
        assert_eq!(parse_typing_target(&serde_json::json!({})), None);
        assert_eq!(parse_typing_target(&serde_json::json!({ "to": "nope" })), None);
        assert_eq!(parse_typing_target(&serde_json::json!({ "to": 42 })), None);
    }
}
