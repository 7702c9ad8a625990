//! Mock event bus implementation for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BusError, EventBus, MessageHandler, Result, SubscriberConfig};
use crate::events::Message;

/// Mock event bus for testing.
///
/// Records every published message instead of routing it.
#[derive(Default)]
pub struct MockEventBus {
    published: RwLock<Vec<Message>>,
    fail_on_publish: RwLock<bool>,
    /// 1-based publish attempt that fails once.
    fail_at: RwLock<Option<usize>>,
    attempts: AtomicUsize,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    /// Fail only the `n`th publish attempt, counting from 1 over the bus lifetime.
    pub async fn fail_publish_number(&self, n: usize) {
        *self.fail_at.write().await = Some(n);
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    /// Published messages with the given routing key, in publish order.
    pub async fn published_with_key(&self, routing_key: &str) -> Vec<Message> {
        self.published
            .read()
            .await
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    pub async fn take_published(&self) -> Vec<Message> {
        std::mem::take(&mut *self.published.write().await)
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, message: Arc<Message>) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_at.read().await == Some(attempt) {
            return Err(BusError::Publish(format!("Mock failure on publish {}", attempt)));
        }
        if *self.fail_on_publish.read().await {
            return Err(BusError::Publish("Mock publish failure".to_string()));
        }
        self.published.write().await.push((*message).clone());
        Ok(())
    }

    async fn subscribe(&self, _handler: Box<dyn MessageHandler>) -> Result<()> {
        Err(BusError::SubscribeNotSupported)
    }

    async fn create_subscriber(&self, _config: SubscriberConfig) -> Result<Arc<dyn EventBus>> {
        Err(BusError::SubscribeNotSupported)
    }
}
