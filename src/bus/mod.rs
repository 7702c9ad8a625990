//! Event bus for topic-routed delivery.
//!
//! This module contains:
//! - `EventBus` trait: publish to the exchange, subscribe via bound queues
//! - `MessageHandler` trait: For processing delivered messages
//! - `SubscriberConfig`: binding patterns for a private queue
//! - Implementations: AMQP (RabbitMQ), in-process channel, Mock

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::events::Message;

// Implementation modules
#[cfg(feature = "amqp")]
pub mod amqp;
pub mod channel;
pub mod dispatch;
pub mod mock;
pub mod topic;

// Re-exports
#[cfg(feature = "amqp")]
pub use amqp::AmqpEventBus;
pub use channel::ChannelEventBus;
pub use dispatch::dispatch_to_handlers;
pub use mock::MockEventBus;
pub use topic::topic_matches;

// ============================================================================
// Traits
// ============================================================================

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("No broker channel available")]
    NotConnected,

    #[error("Bus is closed")]
    Closed,

    #[error("Subscribe not supported for this bus type")]
    SubscribeNotSupported,
}

/// Errors raised while handling a single delivered message.
///
/// Consumers log these and move on to the next message; there is no
/// redelivery.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Invalid payload on '{routing_key}': {reason}")]
    InvalidPayload { routing_key: String, reason: String },

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Handler for processing messages from the bus.
pub trait MessageHandler: Send + Sync {
    /// Process a delivered message.
    fn handle(
        &self,
        message: Arc<Message>,
    ) -> BoxFuture<'static, std::result::Result<(), HandlerError>>;
}

/// Queue bindings for a subscriber.
///
/// Every subscriber owns a private, exclusive queue that is removed when its
/// connection closes. The queue receives every message whose routing key
/// matches at least one binding pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberConfig {
    pub bindings: Vec<String>,
}

impl SubscriberConfig {
    pub fn new<I, S>(bindings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bindings: bindings.into_iter().map(Into::into).collect(),
        }
    }

    /// True if any binding matches the routing key.
    pub fn matches(&self, routing_key: &str) -> bool {
        self.bindings
            .iter()
            .any(|pattern| topic_matches(pattern, routing_key))
    }
}

/// Interface for topic-routed message delivery.
///
/// Implementations:
/// - `AmqpEventBus`: RabbitMQ via AMQP
/// - `ChannelEventBus`: In-process topic exchange
/// - `MockEventBus`: Records published messages for testing
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a message to the exchange.
    ///
    /// Returns once the message has been handed to the exchange. Delivery to
    /// subscribers is asynchronous and unconfirmed.
    async fn publish(&self, message: Arc<Message>) -> Result<()>;

    /// Register a handler. Only meaningful on subscriber instances.
    async fn subscribe(&self, handler: Box<dyn MessageHandler>) -> Result<()>;

    /// Start delivering messages to the registered handlers.
    ///
    /// Messages are handled one at a time, in delivery order.
    async fn start_consuming(&self) -> Result<()> {
        Ok(())
    }

    /// Create a subscriber with its own private queue and bindings,
    /// sharing this bus's connection.
    async fn create_subscriber(&self, config: SubscriberConfig) -> Result<Arc<dyn EventBus>>;

    /// Release the underlying channel. Best effort.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_config_matches_any_binding() {
        let config = SubscriberConfig::new(["account.sendActivationCode", "account.activated"]);
        assert!(config.matches("account.activated"));
        assert!(config.matches("account.sendActivationCode"));
        assert!(!config.matches("account.signup"));
    }

    #[test]
    fn test_subscriber_config_empty_matches_nothing() {
        let config = SubscriberConfig::default();
        assert!(!config.matches("account.signup"));
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::InvalidPayload {
            routing_key: "account.signup".to_string(),
            reason: "invalid utf-8".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid payload on 'account.signup': invalid utf-8"
        );
    }
}
