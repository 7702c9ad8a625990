//! accountflow-activation: Activation service
//!
//! Consumes every `account.*` event, keeps pending activations in memory and
//! publishes the derived events.
//!
//! ## Architecture
//! ```text
//! [exchange] --account.signup----> [accountflow-activation] --account.sendActivationCode--> [exchange]
//! [exchange] --account.activate--> [accountflow-activation] --account.activated-----------> [exchange]
//! ```
//!
//! ## Configuration
//! - RABBIT_MQ_URL: Broker URL (default: amqp://localhost)
//! - EXCHANGE_NAME: Topic exchange (default: email-pub-sub)
//! - MAX_CONNECT_RETRIES / CONNECT_RETRY_SLEEP: connect retry budget
//! - ACCOUNTFLOW_CONFIG / ACCOUNTFLOW__*: layered configuration

use tracing::{error, info};

use accountflow::activation::ActivationService;
use accountflow::bus::EventBus;
use accountflow::config::Config;
use accountflow::utils::bootstrap::{connect_or_exit, init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    info!(exchange = %config.messaging.amqp.exchange, "accountflow-activation starting");

    let Some(bus) = connect_or_exit(&config.messaging).await else {
        shutdown_signal().await;
        info!("Exiting...");
        return Ok(());
    };

    let service = ActivationService::new(bus.clone());
    match service.start(bus.as_ref()).await {
        Ok(subscriber) => {
            shutdown_signal().await;
            subscriber.close().await?;
        }
        Err(e) => {
            error!(error = %e, "Failed to start consuming");
            shutdown_signal().await;
        }
    }

    bus.close().await?;
    info!("Exiting...");
    Ok(())
}
