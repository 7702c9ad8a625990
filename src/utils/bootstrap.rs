//! Bootstrap utilities for accountflow binaries.
//!
//! Shared initialization code for all service binaries.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;
use crate::utils::retry::ConnectError;

/// Initialize tracing with the ACCOUNTFLOW_LOG environment variable.
///
/// Defaults to "info" level if ACCOUNTFLOW_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// What a binary does after its broker connect.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectOutcome<T> {
    Connected(T),
    /// Every attempt was refused; terminate with status 1.
    Exit,
    /// Some other failure; keep running without a channel.
    Continue,
}

/// Decide what to do with a connect result, logging any failure.
pub fn connect_outcome<T, E: std::fmt::Display>(
    result: Result<T, ConnectError<E>>,
) -> ConnectOutcome<T> {
    match result {
        Ok(bus) => ConnectOutcome::Connected(bus),
        Err(e) if e.is_exhausted() => {
            tracing::error!(error = %e, "Giving up on broker connection");
            ConnectOutcome::Exit
        }
        Err(e) => {
            tracing::error!(error = %e, "Broker connection failed, running without a channel");
            ConnectOutcome::Continue
        }
    }
}

/// Connect to the broker.
///
/// - Connected: returns the bus.
/// - Every attempt refused: terminates the process with status 1.
/// - Any other failure: returns `None`; the caller keeps running without a
///   channel until it is shut down.
#[cfg(feature = "amqp")]
pub async fn connect_or_exit(
    config: &crate::config::MessagingConfig,
) -> Option<std::sync::Arc<crate::bus::AmqpEventBus>> {
    use crate::bus::AmqpEventBus;

    let result = AmqpEventBus::connect(&config.amqp, config.connect.policy()).await;
    match connect_outcome(result) {
        ConnectOutcome::Connected(bus) => Some(std::sync::Arc::new(bus)),
        ConnectOutcome::Exit => std::process::exit(1),
        ConnectOutcome::Continue => None,
    }
}
