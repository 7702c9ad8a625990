//! Handler dispatch utilities.
//!
//! Provides the common pattern for dispatching a delivered message to
//! registered handlers.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use super::MessageHandler;
use crate::events::Message;

/// Registered handlers of a subscriber.
pub type HandlerList = Arc<RwLock<Vec<Box<dyn MessageHandler>>>>;

/// Dispatch a message to all registered handlers.
///
/// Calls each handler in sequence, logging errors but continuing to
/// subsequent handlers. A failed message is dropped: consumers run without
/// acknowledgement, so nothing is redelivered. Returns `true` if all
/// handlers succeeded.
pub async fn dispatch_to_handlers(handlers: &HandlerList, message: &Arc<Message>) -> bool {
    let handlers_guard = handlers.read().await;
    let mut all_succeeded = true;

    for handler in handlers_guard.iter() {
        if let Err(e) = handler.handle(Arc::clone(message)).await {
            warn!(
                routing_key = %message.routing_key,
                correlation_id = %message.correlation(),
                error = %e,
                "Handler failed, dropping message"
            );
            all_succeeded = false;
        }
    }

    all_succeeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, HandlerError};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
        fail: bool,
    }

    impl MessageHandler for CountingHandler {
        fn handle(&self, _message: Arc<Message>) -> BoxFuture<'static, Result<(), HandlerError>> {
            let count = self.count.clone();
            let fail = self.fail;
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(HandlerError::Bus(BusError::Closed))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn test_dispatch_all_succeed() {
        let count = Arc::new(AtomicUsize::new(0));
        let handlers: HandlerList = Arc::new(RwLock::new(vec![
            Box::new(CountingHandler {
                count: count.clone(),
                fail: false,
            }) as Box<dyn MessageHandler>,
            Box::new(CountingHandler {
                count: count.clone(),
                fail: false,
            }) as Box<dyn MessageHandler>,
        ]));

        let message = Arc::new(Message::new("account.signup", "a@x.com"));
        assert!(dispatch_to_handlers(&handlers, &message).await);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatch_continues_after_failure() {
        let count = Arc::new(AtomicUsize::new(0));
        let handlers: HandlerList = Arc::new(RwLock::new(vec![
            Box::new(CountingHandler {
                count: count.clone(),
                fail: true,
            }) as Box<dyn MessageHandler>,
            Box::new(CountingHandler {
                count: count.clone(),
                fail: false,
            }) as Box<dyn MessageHandler>,
        ]));

        let message = Arc::new(Message::new("account.signup", "a@x.com"));
        assert!(!dispatch_to_handlers(&handlers, &message).await);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
