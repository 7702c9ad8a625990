//! accountflow-standalone: Whole pipeline in one process
//!
//! Runs the gateway, the activation service and the notification service
//! over an in-process topic exchange. No broker is needed; state is lost on
//! exit. Intended for local development.
//!
//! ## Configuration
//! - PORT: HTTP port (default: 3000)
//! - ACCOUNTFLOW_CONFIG / ACCOUNTFLOW__*: layered configuration

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use accountflow::activation::ActivationService;
use accountflow::bus::{ChannelEventBus, EventBus};
use accountflow::config::Config;
use accountflow::gateway::{self, PublisherSlot};
use accountflow::notification::NotificationService;
use accountflow::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let bus: Arc<dyn EventBus> = Arc::new(ChannelEventBus::new());

    let activation = ActivationService::new(bus.clone())
        .start(bus.as_ref())
        .await?;
    let notification = NotificationService::default().start(bus.as_ref()).await?;

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    info!("accountflow-standalone running");

    gateway::serve(listener, PublisherSlot::connected(bus.clone()), shutdown_signal()).await?;

    activation.close().await?;
    notification.close().await?;
    bus.close().await?;

    info!("Exiting...");
    Ok(())
}
