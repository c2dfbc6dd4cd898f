use chrono::{DateTime, Utc};
use uuid::Uuid;

use voicedate_shared::clients::rabbitmq::RabbitMQClient;
use voicedate_shared::types::event::{payloads, routing_keys, Event};

pub async fn publish_like_recorded(
    rabbitmq: &RabbitMQClient,
    from_user_id: Uuid,
    to_user_id: Uuid,
    call_duration_secs: i32,
    accumulated: bool,
) {
    let event = Event::new(
        "voicedate-matching",
        routing_keys::MATCHING_LIKE_RECORDED,
        payloads::LikeRecorded {
            from_user_id,
            to_user_id,
            call_duration_secs,
            accumulated,
        },
    )
    .with_user(from_user_id);

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, "failed to publish like.recorded event");
    }
}

pub async fn publish_match_created(
    rabbitmq: &RabbitMQClient,
    user_a_id: Uuid,
    user_b_id: Uuid,
    user_a_display_name: &str,
    user_b_display_name: &str,
    matched_at: DateTime<Utc>,
) {
    let event = Event::new(
        "voicedate-matching",
        routing_keys::MATCHING_MATCH_CREATED,
        payloads::MatchCreated {
            user_a_id,
            user_b_id,
            user_a_display_name: user_a_display_name.to_string(),
            user_b_display_name: user_b_display_name.to_string(),
            matched_at,
        },
    )
    .with_user(user_a_id);

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, "failed to publish match.created event");
    }
}
