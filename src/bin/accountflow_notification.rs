//! accountflow-notification: Notification service
//!
//! Consumes `account.sendActivationCode` and `account.activated` and logs
//! the email each would send.
//!
//! ## Configuration
//! - RABBIT_MQ_URL: Broker URL (default: amqp://localhost)
//! - EXCHANGE_NAME: Topic exchange (default: email-pub-sub)
//! - MAX_CONNECT_RETRIES / CONNECT_RETRY_SLEEP: connect retry budget
//! - ACCOUNTFLOW_CONFIG / ACCOUNTFLOW__*: layered configuration

use tracing::{error, info};

use accountflow::bus::EventBus;
use accountflow::config::Config;
use accountflow::notification::NotificationService;
use accountflow::utils::bootstrap::{connect_or_exit, init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    info!(exchange = %config.messaging.amqp.exchange, "accountflow-notification starting");

    let Some(bus) = connect_or_exit(&config.messaging).await else {
        shutdown_signal().await;
        info!("Exiting...");
        return Ok(());
    };

    match NotificationService::default().start(bus.as_ref()).await {
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
