//! Frontend gateway.
//!
//! HTTP endpoints that turn requests into fire-and-forget account events:
//! - `POST /register` `{"email": ..}` publishes `account.signup`
//! - `POST /activate` `{"activationCode": ..}` publishes `account.activate`
//!
//! A published request is answered with 202 Accepted and the correlation id
//! attached to the event. The outcome is never reported back. Without a
//! broker channel the request is answered with 503 and dropped.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::bus::{BusError, EventBus};
use crate::events::{new_correlation_id, Message, ACCOUNT_ACTIVATE, ACCOUNT_SIGNUP};

/// Holds the publishing bus once the broker connection is ready.
///
/// The HTTP server starts before the broker connects; until `set` is called
/// every request is answered with 503.
#[derive(Clone, Default)]
pub struct PublisherSlot {
    bus: Arc<RwLock<Option<Arc<dyn EventBus>>>>,
}

impl PublisherSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that already holds `bus`.
    pub fn connected(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus: Arc::new(RwLock::new(Some(bus))),
        }
    }

    pub async fn set(&self, bus: Arc<dyn EventBus>) {
        *self.bus.write().await = Some(bus);
    }

    pub async fn get(&self) -> Option<Arc<dyn EventBus>> {
        self.bus.read().await.clone()
    }

    /// Empty the slot, returning the bus so it can be closed.
    pub async fn take(&self) -> Option<Arc<dyn EventBus>> {
        self.bus.write().await.take()
    }
}

/// `POST /register` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

/// `POST /activate` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub activation_code: String,
}

/// Body of every gateway reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl GatewayResponse {
    fn accepted(correlation_id: String) -> Self {
        Self {
            msg: "ok".to_string(),
            correlation_id: Some(correlation_id),
        }
    }

    fn error(error: &BusError) -> Self {
        Self {
            msg: error.to_string(),
            correlation_id: None,
        }
    }
}

type Reply = (StatusCode, Json<GatewayResponse>);

/// Build the axum router (separated for testing).
pub fn router(slot: PublisherSlot) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/activate", post(activate))
        .layer(TraceLayer::new_for_http())
        .with_state(slot)
}

/// Serve the gateway on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, slot: PublisherSlot, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(address = %listener.local_addr()?, "Gateway listening");
    axum::serve(listener, router(slot))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn register(State(slot): State<PublisherSlot>, Json(request): Json<RegisterRequest>) -> Reply {
    publish_request(&slot, ACCOUNT_SIGNUP, request.email).await
}

async fn activate(State(slot): State<PublisherSlot>, Json(request): Json<ActivateRequest>) -> Reply {
    publish_request(&slot, ACCOUNT_ACTIVATE, request.activation_code).await
}

async fn publish_request(slot: &PublisherSlot, routing_key: &str, payload: String) -> Reply {
    let Some(bus) = slot.get().await else {
        warn!(routing_key = %routing_key, "No broker channel, request dropped");
        return unavailable(&BusError::NotConnected);
    };

    let correlation_id = new_correlation_id();
    let message =
        Message::new(routing_key, payload).with_correlation_id(Some(correlation_id.clone()));

    match bus.publish(Arc::new(message)).await {
        Ok(()) => {
            info!(routing_key = %routing_key, correlation_id = %correlation_id, "Request accepted");
            (
                StatusCode::ACCEPTED,
                Json(GatewayResponse::accepted(correlation_id)),
            )
        }
        Err(e) => {
            warn!(routing_key = %routing_key, error = %e, "Publish failed, request dropped");
            unavailable(&e)
        }
    }
}

fn unavailable(error: &BusError) -> Reply {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(GatewayResponse::error(error)),
    )
}
