mod bootstrap;
mod health;
mod webhook;

use std::time::Duration;

use anyhow::Result;
use slotpoll_core::config::{AppConfig, LoadOptions, TransportMode};
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use slotpoll_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging is configured from the same file, so it comes up after config.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let server = &app.config.server;

    health::spawn(
        &server.bind_address,
        server.health_check_port,
        health::HealthState::new(app.transport, app.dispatcher.handler_count()),
    )
    .await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode = app.transport.as_str(),
        "slotpoll-server started"
    );

    let grace = Duration::from_secs(server.graceful_shutdown_secs);
    match app.transport {
        TransportMode::Webhook => {
            let state = app.webhook_state()?;
            webhook::serve(&server.bind_address, server.port, state.clone(), async {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
            })
            .await?;
            if tokio::time::timeout(grace, state.drain()).await.is_err() {
                warn!(
                    grace_secs = server.graceful_shutdown_secs,
                    "in-flight webhook dispatches did not finish before shutdown"
                );
            }
        }
        TransportMode::Socket => {
            let runner = app.socket_runner()?;
            tokio::select! {
                result = runner.start() => result?,
                signal = wait_for_shutdown() => signal?,
            }
            match tokio::time::timeout(grace, runner.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(error = %error, "socket mode disconnect failed"),
                Err(_) => warn!(
                    grace_secs = server.graceful_shutdown_secs,
                    "in-flight socket mode dispatches did not finish before shutdown"
                ),
            }
        }
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "slotpoll-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
