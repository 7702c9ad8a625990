//! accountflow-gateway: HTTP frontend
//!
//! Accepts `POST /register` and `POST /activate` and publishes the matching
//! account request. The listener comes up first; requests are answered with
//! 503 until the broker connection is ready.
//!
//! ## Configuration
//! - QUEUE_URL: Broker URL (default: amqp://localhost)
//! - EXCHANGE_NAME: Topic exchange (default: email-pub-sub)
//! - PORT: HTTP port (default: 3000)
//! - ACCOUNTFLOW_CONFIG / ACCOUNTFLOW__*: layered configuration

use tokio::net::TcpListener;
use tracing::{info, warn};

use accountflow::bus::EventBus;
use accountflow::config::Config;
use accountflow::gateway::{self, PublisherSlot};
use accountflow::utils::bootstrap::{connect_or_exit, init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let listener = TcpListener::bind(config.server.bind_address()).await?;

    let slot = PublisherSlot::new();
    let connector = {
        let slot = slot.clone();
        let messaging = config.messaging.clone();
        tokio::spawn(async move {
            if let Some(bus) = connect_or_exit(&messaging).await {
                slot.set(bus).await;
            }
        })
    };

    gateway::serve(listener, slot.clone(), shutdown_signal()).await?;

    connector.abort();
    if let Some(bus) = slot.take().await {
        if let Err(e) = bus.close().await {
            warn!(error = %e, "Failed to close broker connection");
        }
    }

    info!("Exiting...");
    Ok(())
}
