use std::sync::Arc;
use std::time::Duration;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use voicedate_shared::clients::rabbitmq::RabbitMQClient;
use voicedate_shared::types::event::{payloads, routing_keys, Event};

use crate::AppState;

const QUEUE: &str = "voicedate-messaging.matching.match.created";
const MAX_RECONNECT_DELAY_SECS: u64 = 30;

fn next_delay(current: u64) -> u64 {
    (current * 2).min(MAX_RECONNECT_DELAY_SECS)
}

/// Consume matching.match.created and push `match_found` to both members'
/// socket rooms. Runs for the life of the process: a broker outage or a
/// closed delivery stream triggers a reconnect with capped backoff rather
/// than silently ending notifications.
pub async fn listen_match_created(state: Arc<AppState>) {
    let mut delay = 1;
    loop {
        match consume(&state).await {
            Ok(()) => {
                tracing::error!("match.created consumer stream ended, reconnecting");
                delay = 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "match.created consumer failed, reconnecting");
            }
        }
        tokio::time::sleep(Duration::from_secs(delay)).await;
        delay = next_delay(delay);
    }
}

/// One consumer session on a fresh connection; the channel held in
/// `AppState` may be dead by the time we get here.
async fn consume(state: &Arc<AppState>) -> anyhow::Result<()> {
    let client = RabbitMQClient::connect(&state.config.rabbitmq_url).await?;
    let mut consumer = client
        .subscribe(QUEUE, routing_keys::MATCHING_MATCH_CREATED)
        .await?;

    tracing::info!("listening for matching.match.created events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::MatchCreated>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        tracing::info!(
                            user_a = %data.user_a_id,
                            user_b = %data.user_b_id,
                            "received match.created event"
                        );
                        notify_match(state, data);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize match.created event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

/// Each member sees the OTHER member's name in their notification.
fn notify_match(state: &Arc<AppState>, data: &payloads::MatchCreated) {
    let to_a = serde_json::json!({
        "partner_id": data.user_b_id,
        "partner_name": data.user_b_display_name,
        "matched_at": data.matched_at,
    });
    let to_b = serde_json::json!({
        "partner_id": data.user_a_id,
        "partner_name": data.user_a_display_name,
        "matched_at": data.matched_at,
    });

    let _ = state
        .io
        .to(format!("user:{}", data.user_a_id))
        .emit("match_found", &to_a);
    let _ = state
        .io
        .to(format!("user:{}", data.user_b_id))
        .emit("match_found", &to_b);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_then_caps() {
        let mut delay = 1;
        let mut seen = vec![delay];
        for _ in 0..6 {
            delay = next_delay(delay);
            seen.push(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 30, 30]);
    }
}
