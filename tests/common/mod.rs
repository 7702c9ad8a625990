//! Shared utilities for integration tests.
//!
//! Wires the activation and notification services onto an in-process
//! channel bus and taps the derived events.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use accountflow::activation::{ActivationRecord, ActivationService, FixedCodeGenerator};
use accountflow::bus::{
    ChannelEventBus, EventBus, HandlerError, MessageHandler, SubscriberConfig,
};
use accountflow::events::{Message, ACCOUNT_ACTIVATED, ACCOUNT_SEND_ACTIVATION_CODE};
use accountflow::notification::{NotificationService, Notifier};
use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

/// How long to wait for something that should arrive.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// An email the notification service would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Email {
    Activation(ActivationRecord, String),
    Welcome(ActivationRecord, String),
}

/// Notifier that forwards every email to a channel.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Email>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_activation_email(&self, record: &ActivationRecord, correlation_id: &str) {
        let _ = self
            .tx
            .send(Email::Activation(record.clone(), correlation_id.to_string()));
    }

    async fn send_welcome_email(&self, record: &ActivationRecord, correlation_id: &str) {
        let _ = self
            .tx
            .send(Email::Welcome(record.clone(), correlation_id.to_string()));
    }
}

/// Handler that forwards every received message to a channel.
pub struct ForwardingHandler {
    pub tx: mpsc::UnboundedSender<Arc<Message>>,
}

impl MessageHandler for ForwardingHandler {
    fn handle(&self, message: Arc<Message>) -> BoxFuture<'static, Result<(), HandlerError>> {
        let tx = self.tx.clone();
        Box::pin(async move {
            let _ = tx.send(message);
            Ok(())
        })
    }
}

/// Subscribe a forwarding handler with the given bindings.
pub async fn tap(
    bus: &dyn EventBus,
    bindings: &[&str],
) -> (Arc<dyn EventBus>, mpsc::UnboundedReceiver<Arc<Message>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscriber = bus
        .create_subscriber(SubscriberConfig::new(bindings.iter().copied()))
        .await
        .unwrap();
    subscriber
        .subscribe(Box::new(ForwardingHandler { tx }))
        .await
        .unwrap();
    subscriber.start_consuming().await.unwrap();
    (subscriber, rx)
}

pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("Timed out waiting for message")
        .expect("Channel closed")
}

/// Both services running on one in-process exchange.
pub struct Pipeline {
    pub bus: Arc<dyn EventBus>,
    pub activation: ActivationService,
    /// Derived events as published by the activation service.
    pub derived: mpsc::UnboundedReceiver<Arc<Message>>,
    /// Emails as handed to the notifier.
    pub emails: mpsc::UnboundedReceiver<Email>,
    subscribers: Vec<Arc<dyn EventBus>>,
}

impl Pipeline {
    /// Start the pipeline; signups receive `codes` in order.
    pub async fn start(codes: &[&str]) -> Self {
        let bus: Arc<dyn EventBus> = Arc::new(ChannelEventBus::new());

        let (derived_sub, derived) = tap(
            bus.as_ref(),
            &[ACCOUNT_SEND_ACTIVATION_CODE, ACCOUNT_ACTIVATED],
        )
        .await;

        let activation = ActivationService::with_code_generator(
            bus.clone(),
            Arc::new(FixedCodeGenerator::new(codes.iter().copied())),
        );
        let activation_sub = activation.start(bus.as_ref()).await.unwrap();

        let (tx, emails) = mpsc::unbounded_channel();
        let notification_sub = NotificationService::new(Arc::new(RecordingNotifier { tx }))
            .start(bus.as_ref())
            .await
            .unwrap();

        Self {
            bus,
            activation,
            derived,
            emails,
            subscribers: vec![derived_sub, activation_sub, notification_sub],
        }
    }

    pub async fn publish(&self, routing_key: &str, payload: &str, correlation_id: &str) {
        let message = Message::new(routing_key, payload)
            .with_correlation_id(Some(correlation_id.to_string()));
        self.bus.publish(Arc::new(message)).await.unwrap();
    }

    /// Next derived event, decoded.
    pub async fn next_derived(&mut self) -> (String, ActivationRecord, Option<String>) {
        let message = recv(&mut self.derived).await;
        let record = serde_json::from_slice(&message.payload).unwrap();
        (message.routing_key.clone(), record, message.correlation_id.clone())
    }

    pub async fn shutdown(self) {
        for subscriber in self.subscribers {
            subscriber.close().await.unwrap();
        }
    }
}
