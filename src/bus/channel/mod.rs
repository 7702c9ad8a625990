//! In-memory channel-based event bus for standalone mode.
//!
//! Behaves like a topic exchange inside a single process: every subscriber
//! acts as a private queue with its own binding patterns, fed from a shared
//! tokio broadcast channel. Ideal for local development and testing without
//! a broker.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::dispatch::{dispatch_to_handlers, HandlerList};
use super::{BusError, EventBus, MessageHandler, Result, SubscriberConfig};
use crate::events::Message;

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// In-memory event bus using tokio broadcast channels.
///
/// Messages are published to a broadcast channel and received by all
/// subscribers. Binding filters are applied on the subscriber side.
pub struct ChannelEventBus {
    /// Broadcast sender for publishing messages.
    sender: broadcast::Sender<Arc<Message>>,
    /// Bindings of this subscriber (empty for a publisher).
    config: SubscriberConfig,
    /// Registered message handlers.
    handlers: HandlerList,
    /// Consumer task, present while consuming.
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelEventBus {
    /// Create a publisher-only bus with a fresh exchange.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        info!("Channel event bus initialized");

        Self::with_sender(sender, SubscriberConfig::default())
    }

    fn with_sender(sender: broadcast::Sender<Arc<Message>>, config: SubscriberConfig) -> Self {
        Self {
            sender,
            config,
            handlers: Arc::new(RwLock::new(Vec::new())),
            consumer: Mutex::new(None),
        }
    }

    /// Create a new bus that shares the same exchange but has its own bindings.
    pub fn with_bindings(&self, config: SubscriberConfig) -> Self {
        Self::with_sender(self.sender.clone(), config)
    }

    /// Start consuming messages (call after subscribe).
    async fn start_consuming_impl(&self) -> Result<()> {
        let mut consumer = self.consumer.lock().await;
        if consumer.is_some() {
            return Ok(());
        }

        // Subscribe before spawning so nothing published after this call is missed.
        let mut receiver = self.sender.subscribe();
        let handlers = self.handlers.clone();
        let config = self.config.clone();

        *consumer = Some(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if !config.matches(&message.routing_key) {
                            continue;
                        }

                        debug!(
                            routing_key = %message.routing_key,
                            "Received message via channel"
                        );

                        dispatch_to_handlers(&handlers, &message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        error!(skipped = n, "Channel consumer lagged, skipped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Channel closed, stopping consumer");
                        break;
                    }
                }
            }
        }));

        info!(bindings = ?self.config.bindings, "Channel consumer started");

        Ok(())
    }
}

impl Default for ChannelEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for ChannelEventBus {
    async fn publish(&self, message: Arc<Message>) -> Result<()> {
        let routing_key = message.routing_key.clone();

        // A topic exchange drops messages nobody is bound to
        match self.sender.send(message) {
            Ok(receiver_count) => {
                debug!(
                    routing_key = %routing_key,
                    receivers = receiver_count,
                    "Published message to channel"
                );
            }
            Err(_) => {
                debug!(routing_key = %routing_key, "No active receivers for message");
            }
        }

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
        self.start_consuming_impl().await
    }

    async fn create_subscriber(&self, config: SubscriberConfig) -> Result<Arc<dyn EventBus>> {
        Ok(Arc::new(self.with_bindings(config)))
    }

    async fn close(&self) -> Result<()> {
        if let Some(consumer) = self.consumer.lock().await.take() {
            consumer.abort();
            info!(bindings = ?self.config.bindings, "Channel consumer stopped");
        }
        Ok(())
    }
}
