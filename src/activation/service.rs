//! Activation event handler.
//!
//! Consumes every `account.*` event from a private queue, keeps the
//! activation store current and publishes the derived events. Correlation
//! ids are copied from the triggering message onto every derived event.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Activation, ActivationRecord, ActivationStore, CodeGenerator, RandomCodeGenerator};
use crate::bus::{EventBus, HandlerError, MessageHandler, SubscriberConfig};
use crate::events::{
    AccountEvent, Message, ACCOUNT_ACTIVATED, ACCOUNT_SEND_ACTIVATION_CODE, ALL_ACCOUNT_EVENTS,
};

/// Owns the activation store and reacts to signup and activate requests.
///
/// Cloning shares the store, publisher and code generator.
#[derive(Clone)]
pub struct ActivationService {
    publisher: Arc<dyn EventBus>,
    store: Arc<Mutex<ActivationStore>>,
    codes: Arc<dyn CodeGenerator>,
}

impl ActivationService {
    /// Service publishing through `publisher`, with random codes.
    pub fn new(publisher: Arc<dyn EventBus>) -> Self {
        Self::with_code_generator(publisher, Arc::new(RandomCodeGenerator))
    }

    pub fn with_code_generator(publisher: Arc<dyn EventBus>, codes: Arc<dyn CodeGenerator>) -> Self {
        Self {
            publisher,
            store: Arc::new(Mutex::new(ActivationStore::new())),
            codes,
        }
    }

    /// Shared handle to the store.
    pub fn store(&self) -> Arc<Mutex<ActivationStore>> {
        Arc::clone(&self.store)
    }

    /// One binding covering every account event.
    pub fn subscriber_config() -> SubscriberConfig {
        SubscriberConfig::new([ALL_ACCOUNT_EVENTS])
    }

    /// Create the private queue on `bus`, register this service and start
    /// consuming. Returns the subscriber so the caller can close it.
    pub async fn start(&self, bus: &dyn EventBus) -> crate::bus::Result<Arc<dyn EventBus>> {
        let subscriber = bus.create_subscriber(Self::subscriber_config()).await?;
        subscriber.subscribe(Box::new(self.clone())).await?;
        subscriber.start_consuming().await?;

        info!(binding = ALL_ACCOUNT_EVENTS, "Activation service consuming");
        Ok(subscriber)
    }

    async fn process(&self, message: &Message) -> Result<(), HandlerError> {
        match message.event() {
            Some(AccountEvent::Signup) => self.on_signup(message).await,
            Some(AccountEvent::Activate) => self.on_activate(message).await,
            // Our own derived events come back through the wildcard binding
            _ => {
                debug!(routing_key = %message.routing_key, "Ignoring event");
                Ok(())
            }
        }
    }

    async fn on_signup(&self, message: &Message) -> Result<(), HandlerError> {
        let email = text_payload(message)?;
        let code = self.codes.generate();

        let record = self.store.lock().await.create(email, code);
        info!(
            email = %record.email,
            activation_code = %record.activation_code,
            correlation_id = %message.correlation(),
            "Created pending activation"
        );

        self.publish_derived(ACCOUNT_SEND_ACTIVATION_CODE, &record, message)
            .await
    }

    async fn on_activate(&self, message: &Message) -> Result<(), HandlerError> {
        let code = text_payload(message)?;

        let outcomes = self.store.lock().await.activations(code);
        if outcomes.is_empty() {
            debug!(
                activation_code = %code,
                correlation_id = %message.correlation(),
                "No activation for code"
            );
            return Ok(());
        }

        // A record is marked only once its event is out, so a failed publish
        // leaves it pending for the next activate request
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Activation::Pending { slot, record } => {
                    if let Err(e) = self.publish_derived(ACCOUNT_ACTIVATED, &record, message).await
                    {
                        warn!(
                            email = %record.email,
                            correlation_id = %message.correlation(),
                            error = %e,
                            "Activation not published, record stays pending"
                        );
                        first_error.get_or_insert(e);
                        continue;
                    }

                    self.store.lock().await.mark_activated(code, slot);
                    info!(
                        email = %record.email,
                        correlation_id = %message.correlation(),
                        "Account activated"
                    );
                }
                Activation::AlreadyActivated(record) => {
                    info!(
                        email = %record.email,
                        activation_code = %record.activation_code,
                        "Account already activated"
                    );
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn publish_derived(
        &self,
        routing_key: &str,
        record: &ActivationRecord,
        cause: &Message,
    ) -> Result<(), HandlerError> {
        let payload = serde_json::to_vec(record)?;
        let message =
            Message::new(routing_key, payload).with_correlation_id(cause.correlation_id.clone());

        self.publisher.publish(Arc::new(message)).await?;
        debug!(
            routing_key = %routing_key,
            correlation_id = %cause.correlation(),
            "Published derived event"
        );
        Ok(())
    }
}

impl MessageHandler for ActivationService {
    fn handle(&self, message: Arc<Message>) -> BoxFuture<'static, Result<(), HandlerError>> {
        let service = self.clone();
        Box::pin(async move {
            info!(
                routing_key = %message.routing_key,
                correlation_id = %message.correlation(),
                "Received event"
            );
            service.process(&message).await
        })
    }
}

fn text_payload(message: &Message) -> Result<&str, HandlerError> {
    message
        .payload_str()
        .map_err(|e| HandlerError::InvalidPayload {
            routing_key: message.routing_key.clone(),
            reason: e.to_string(),
        })
}
