//! AMQP (RabbitMQ) event bus implementation.
//!
//! Owns one connection and one channel to the broker. Publishes to a
//! non-durable topic exchange; subscribers consume from private, exclusive,
//! auto-deleted queues bound with one or more routing patterns, without
//! acknowledgements.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatch::{dispatch_to_handlers, HandlerList};
use super::{BusError, EventBus, MessageHandler, Result, SubscriberConfig};
use crate::config::AmqpConfig;
use crate::events::Message;
use crate::utils::retry::{is_connection_refused, ConnectError, Connector, RetryPolicy};

/// Reply code for a normal channel/connection close.
const REPLY_SUCCESS: u16 = 200;

/// AMQP event bus implementation using RabbitMQ.
///
/// The bus returned by `connect` owns the connection and publishes.
/// Subscribers created from it share the connection and channel and add
/// their own private queue.
pub struct AmqpEventBus {
    connection: Arc<Connection>,
    channel: Channel,
    exchange: String,
    config: SubscriberConfig,
    handlers: HandlerList,
    consumer: Mutex<Option<JoinHandle<()>>>,
    owns_connection: bool,
}

impl AmqpEventBus {
    /// Connect to the broker, open a channel and declare the exchange.
    ///
    /// Refused connections are retried according to `policy`. Any other
    /// failure, including channel or exchange setup, is returned as
    /// `ConnectError::Fatal` without retrying.
    pub async fn connect(
        config: &AmqpConfig,
        policy: RetryPolicy,
    ) -> std::result::Result<Self, ConnectError<lapin::Error>> {
        let url = config.connection_url();
        let mut connector = Connector::new(policy);

        let connection = connector
            .connect(
                &url,
                || Connection::connect(&url, ConnectionProperties::default()),
                is_refused,
            )
            .await?;

        let channel = connection.create_channel().await.map_err(|e| {
            error!(error = %e, "Failed to create channel");
            ConnectError::Fatal(e)
        })?;
        info!("Channel created");

        // Declaring is idempotent; every service declares the same exchange
        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                error!(exchange = %config.exchange, error = %e, "Failed to declare exchange");
                ConnectError::Fatal(e)
            })?;

        info!(exchange = %config.exchange, "Exchange declared, connected to AMQP");

        Ok(Self {
            connection: Arc::new(connection),
            channel,
            exchange: config.exchange.clone(),
            config: SubscriberConfig::default(),
            handlers: Arc::new(RwLock::new(Vec::new())),
            consumer: Mutex::new(None),
            owns_connection: true,
        })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Declare the private queue, bind it, and start the consumer.
    async fn setup_consumer(&self) -> Result<lapin::Consumer> {
        let queue = self
            .channel
            .queue_declare("", private_queue_options(), FieldTable::default())
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;

        for binding in &self.config.bindings {
            self.channel
                .queue_bind(
                    queue.name().as_str(),
                    &self.exchange,
                    binding,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BusError::Subscribe(format!("Failed to bind queue: {}", e)))?;

            info!(
                queue = %queue.name().as_str(),
                routing_key = %binding,
                "Bound queue to exchange"
            );
        }

        self.channel
            .basic_consume(
                queue.name().as_str(),
                "",
                no_ack_consume_options(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))
    }

    /// Deliver messages to handlers one at a time until the stream ends.
    async fn consume(mut consumer: lapin::Consumer, handlers: HandlerList) {
        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    let routing_key = delivery.routing_key.as_str().to_string();
                    let correlation_id = delivery
                        .properties
                        .correlation_id()
                        .as_ref()
                        .map(|id| id.as_str().to_string());

                    debug!(routing_key = %routing_key, "Received delivery");

                    let message = Arc::new(Message {
                        routing_key,
                        payload: delivery.data,
                        correlation_id,
                    });
                    dispatch_to_handlers(&handlers, &message).await;
                }
                Err(e) => {
                    error!(error = %e, "Consumer delivery error");
                    break;
                }
            }
        }

        info!("Consumer stream ended");
    }
}

/// Connection refused is the only failure worth retrying.
fn is_refused(error: &lapin::Error) -> bool {
    matches!(error, lapin::Error::IOError(io) if is_connection_refused(io))
}

/// Server-named, exclusive queue removed with its connection.
fn private_queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        exclusive: true,
        auto_delete: true,
        ..Default::default()
    }
}

/// The broker forgets a message once it is sent to the consumer.
fn no_ack_consume_options() -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: true,
        ..Default::default()
    }
}

#[async_trait]
impl EventBus for AmqpEventBus {
    async fn publish(&self, message: Arc<Message>) -> Result<()> {
        let mut properties = BasicProperties::default();
        if let Some(correlation_id) = &message.correlation_id {
            properties = properties.with_correlation_id(correlation_id.as_str().into());
        }

        self.channel
            .basic_publish(
                &self.exchange,
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.payload,
                properties,
            )
            .await
            .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?
            .await
            .map_err(|e| BusError::Publish(format!("Publish confirmation failed: {}", e)))?;

        debug!(
            exchange = %self.exchange,
            routing_key = %message.routing_key,
            correlation_id = %message.correlation(),
            "Published message"
        );

        Ok(())
    }

    async fn subscribe(&self, handler: Box<dyn MessageHandler>) -> Result<()> {
        if self.config.bindings.is_empty() {
            return Err(BusError::Subscribe(
                "Cannot subscribe: no bindings configured. Use create_subscriber()".to_string(),
            ));
        }

        self.handlers.write().await.push(handler);
        Ok(())
    }

    async fn start_consuming(&self) -> Result<()> {
        let mut consumer_task = self.consumer.lock().await;
        if consumer_task.is_some() {
            return Ok(());
        }

        let consumer = self.setup_consumer().await?;
        let handlers = self.handlers.clone();
        *consumer_task = Some(tokio::spawn(Self::consume(consumer, handlers)));

        info!(bindings = ?self.config.bindings, "Consumer started");
        Ok(())
    }

    async fn create_subscriber(&self, config: SubscriberConfig) -> Result<Arc<dyn EventBus>> {
        Ok(Arc::new(Self {
            connection: Arc::clone(&self.connection),
            channel: self.channel.clone(),
            exchange: self.exchange.clone(),
            config,
            handlers: Arc::new(RwLock::new(Vec::new())),
            consumer: Mutex::new(None),
            owns_connection: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        if let Some(consumer) = self.consumer.lock().await.take() {
            consumer.abort();
        }

        if !self.owns_connection {
            return Ok(());
        }

        if let Err(e) = self.channel.close(REPLY_SUCCESS, "Bye").await {
            warn!(error = %e, "Failed to close channel");
        }
        self.connection
            .close(REPLY_SUCCESS, "Bye")
            .await
            .map_err(|e| BusError::Connection(format!("Failed to close connection: {}", e)))?;

        info!("AMQP connection closed");
        Ok(())
    }
}
