use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping all domain events.
///
/// Routing key format: `voicedate.{service}.{entity}.{action}`
/// Example: `voicedate.matching.match.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Matching events
    pub const MATCHING_LIKE_RECORDED: &str = "voicedate.matching.like.recorded";
    pub const MATCHING_MATCH_CREATED: &str = "voicedate.matching.match.created";

    // Messaging events
    pub const MESSAGING_MESSAGE_SENT: &str = "voicedate.messaging.message.sent";
    pub const MESSAGING_CONVERSATION_CREATED: &str = "voicedate.messaging.conversation.created";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// A directional like was written (new edge or accumulated duration).
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LikeRecorded {
        pub from_user_id: Uuid,
        pub to_user_id: Uuid,
        pub call_duration_secs: i32,
        pub accumulated: bool,
    }

    /// Both directional likes now exist; the pair is matched.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchCreated {
        pub user_a_id: Uuid,
        pub user_b_id: Uuid,
        pub user_a_display_name: String,
        pub user_b_display_name: String,
        pub matched_at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MessageSent {
        pub message_id: Uuid,
        pub conversation_id: Uuid,
        pub sender_id: Uuid,
        pub recipient_id: Uuid,
        pub content_preview: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ConversationCreated {
        pub conversation_id: Uuid,
        pub user_a_id: Uuid,
        pub user_b_id: Uuid,
    }
}
