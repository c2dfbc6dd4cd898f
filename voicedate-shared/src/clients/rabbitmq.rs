//! Eventing over a single durable topic exchange.
//!
//! An event's `event_type` doubles as its routing key, so publishers build
//! an [`Event`] and hand it over without repeating the key at the call
//! site. Subscribers bind one durable queue per concern to one key.

use anyhow::Context;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use serde::Serialize;

use crate::types::event::Event;

const EXCHANGE: &str = "voicedate.events";

#[derive(Clone)]
pub struct RabbitMQClient {
    channel: Channel,
}

impl RabbitMQClient {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .context("connect to RabbitMQ")?;
        let channel = connection.create_channel().await.context("open channel")?;

        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("declare exchange")?;

        tracing::info!(url = %url, exchange = EXCHANGE, "RabbitMQ ready");
        Ok(Self { channel })
    }

    /// Publish an event, routed by its `event_type`. Delivery is persistent
    /// and broker-confirmed before this returns.
    pub async fn publish<T: Serialize>(&self, event: &Event<T>) -> anyhow::Result<()> {
        let body = serde_json::to_vec(event).context("serialize event")?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        self.channel
            .basic_publish(
                EXCHANGE,
                &event.event_type,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .context("publish event")?
            .await
            .context("broker confirmation")?;

        tracing::debug!(routing_key = %event.event_type, event_id = %event.id, "event published");
        Ok(())
    }

    /// Declare a durable queue, bind it to `routing_key`, start consuming.
    pub async fn subscribe(&self, queue: &str, routing_key: &str) -> anyhow::Result<Consumer> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("declare queue")?;

        self.channel
            .queue_bind(
                queue,
                EXCHANGE,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("bind queue")?;

        let consumer = self
            .channel
            .basic_consume(
                queue,
                queue,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("start consumer")?;

        tracing::info!(queue = %queue, routing_key = %routing_key, "consuming");
        Ok(consumer)
    }
}
