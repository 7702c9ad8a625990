//! Notification service.
//!
//! Sink for the derived account events. Each event is handed to a
//! `Notifier`; the default one writes a log line in place of sending email.
//! Nothing is published and nothing is kept.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::activation::ActivationRecord;
use crate::bus::{EventBus, HandlerError, MessageHandler, SubscriberConfig};
use crate::events::{AccountEvent, Message, ACCOUNT_ACTIVATED, ACCOUNT_SEND_ACTIVATION_CODE};

/// Delivers account emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A pending record was created; tell the owner its code.
    async fn send_activation_email(&self, record: &ActivationRecord, correlation_id: &str);

    /// A record was activated.
    async fn send_welcome_email(&self, record: &ActivationRecord, correlation_id: &str);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_activation_email(&self, record: &ActivationRecord, correlation_id: &str) {
        info!(
            email = %record.email,
            activation_code = %record.activation_code,
            correlation_id = %correlation_id,
            "Sending activation email"
        );
    }

    async fn send_welcome_email(&self, record: &ActivationRecord, correlation_id: &str) {
        info!(
            email = %record.email,
            correlation_id = %correlation_id,
            "Sending welcome email"
        );
    }
}

/// Routes derived account events to a `Notifier`.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Two bindings on one private queue.
    pub fn subscriber_config() -> SubscriberConfig {
        SubscriberConfig::new([ACCOUNT_SEND_ACTIVATION_CODE, ACCOUNT_ACTIVATED])
    }

    /// Create the private queue on `bus`, register this service and start
    /// consuming. Returns the subscriber so the caller can close it.
    pub async fn start(&self, bus: &dyn EventBus) -> crate::bus::Result<Arc<dyn EventBus>> {
        let subscriber = bus.create_subscriber(Self::subscriber_config()).await?;
        subscriber.subscribe(Box::new(self.clone())).await?;
        subscriber.start_consuming().await?;

        info!("Notification service consuming");
        Ok(subscriber)
    }

    async fn process(&self, message: &Message) -> Result<(), HandlerError> {
        let event = match message.event() {
            Some(event @ (AccountEvent::SendActivationCode | AccountEvent::Activated)) => event,
            _ => {
                debug!(routing_key = %message.routing_key, "Ignoring event");
                return Ok(());
            }
        };

        let record: ActivationRecord = serde_json::from_slice(&message.payload)?;
        match event {
            AccountEvent::SendActivationCode => {
                self.notifier
                    .send_activation_email(&record, message.correlation())
                    .await
            }
            _ => {
                self.notifier
                    .send_welcome_email(&record, message.correlation())
                    .await
            }
        }

        Ok(())
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(Arc::new(LogNotifier))
    }
}

impl MessageHandler for NotificationService {
    fn handle(&self, message: Arc<Message>) -> BoxFuture<'static, Result<(), HandlerError>> {
        let service = self.clone();
        Box::pin(async move { service.process(&message).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(&'static str, ActivationRecord, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_activation_email(&self, record: &ActivationRecord, correlation_id: &str) {
            self.sent
                .lock()
                .await
                .push(("activation", record.clone(), correlation_id.to_string()));
        }

        async fn send_welcome_email(&self, record: &ActivationRecord, correlation_id: &str) {
            self.sent
                .lock()
                .await
                .push(("welcome", record.clone(), correlation_id.to_string()));
        }
    }

    fn event(key: &str, record: &ActivationRecord) -> Arc<Message> {
        let payload = serde_json::to_vec(record).unwrap();
        Arc::new(Message::new(key, payload).with_correlation_id(Some("c-1".to_string())))
    }

    #[tokio::test]
    async fn test_send_activation_code_sends_activation_email() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = NotificationService::new(notifier.clone());
        let record = ActivationRecord::pending("a@x.com", "4821");

        service
            .handle(event(ACCOUNT_SEND_ACTIVATION_CODE, &record))
            .await
            .unwrap();

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("activation", record, "c-1".to_string()));
    }

    #[tokio::test]
    async fn test_activated_sends_welcome_email() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = NotificationService::new(notifier.clone());
        let mut record = ActivationRecord::pending("a@x.com", "4821");
        record.activated = true;

        service
            .handle(event(ACCOUNT_ACTIVATED, &record))
            .await
            .unwrap();

        let sent = notifier.sent.lock().await;
        assert_eq!(sent[0].0, "welcome");
        assert!(sent[0].1.activated);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_decode_error() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = NotificationService::new(notifier.clone());

        let result = service
            .handle(Arc::new(Message::new(ACCOUNT_ACTIVATED, "not json")))
            .await;

        assert!(matches!(result, Err(HandlerError::Decode(_))));
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_requests_are_ignored() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = NotificationService::new(notifier.clone());

        service
            .handle(Arc::new(Message::new("account.signup", "a@x.com")))
            .await
            .unwrap();

        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_handles_both_events() {
        let service = NotificationService::default();
        let record = ActivationRecord::pending("a@x.com", "4821");

        assert!(service
            .handle(event(ACCOUNT_SEND_ACTIVATION_CODE, &record))
            .await
            .is_ok());
        assert!(service
            .handle(event(ACCOUNT_ACTIVATED, &record))
            .await
            .is_ok());
    }

    #[test]
    fn test_subscriber_config_has_two_bindings() {
        let config = NotificationService::subscriber_config();
        assert_eq!(config.bindings.len(), 2);
        assert!(config.matches(ACCOUNT_SEND_ACTIVATION_CODE));
        assert!(config.matches(ACCOUNT_ACTIVATED));
        assert!(!config.matches("account.signup"));
    }
}
