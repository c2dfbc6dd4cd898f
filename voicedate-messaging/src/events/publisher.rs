use uuid::Uuid;

use voicedate_shared::clients::rabbitmq::RabbitMQClient;
use voicedate_shared::types::event::{payloads, routing_keys, Event};

pub async fn publish_message_sent(
    rabbitmq: &RabbitMQClient,
    message_id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    content_preview: &str,
) {
    let event = Event::new(
        "voicedate-messaging",
        routing_keys::MESSAGING_MESSAGE_SENT,
        payloads::MessageSent {
            message_id,
            conversation_id,
            sender_id,
            recipient_id,
            content_preview: content_preview.to_string(),
        },
    )
    .with_user(sender_id);

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, "failed to publish message.sent event");
    }
}

pub async fn publish_conversation_created(
    rabbitmq: &RabbitMQClient,
    conversation_id: Uuid,
    user_a_id: Uuid,
    user_b_id: Uuid,
) {
    let event = Event::new(
        "voicedate-messaging",
        routing_keys::MESSAGING_CONVERSATION_CREATED,
        payloads::ConversationCreated {
            conversation_id,
            user_a_id,
            user_b_id,
        },
    );

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, "failed to publish conversation.created event");
    }
}
