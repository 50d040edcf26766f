mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::{anyhow, Result};
use slotbook_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use slotbook_core::config::LogFormat::*;
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
    // .env only feeds the environment layer of the config
    let dotenv_result = dotenv::dotenv();
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    if let Err(error) = dotenv_result {
        tracing::debug!(
            event_name = "system.server.dotenv_skipped",
            correlation_id = "bootstrap",
            reason = %error,
            "no .env file loaded"
        );
    }

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.health.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "slotbook-server started"
    );

    let runner = app.runner;
    let mut polling = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        outcome = &mut polling => {
            // the runner retries transport failures forever, so any return is abnormal
            let error = match outcome {
                Ok(Ok(())) => anyhow!("telegram update stream ended"),
                Ok(Err(error)) => error,
                Err(join_error) => join_error.into(),
            };
            tracing::error!(
                event_name = "system.server.polling_stopped",
                correlation_id = "shutdown",
                error = %error,
                "polling runner stopped"
            );
            return Err(error);
        }
        signal = wait_for_shutdown() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "slotbook-server stopping"
            );
            polling.abort();
            let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
            if tokio::time::timeout(grace, polling).await.is_err() {
                tracing::warn!(
                    event_name = "system.server.shutdown_timeout",
                    correlation_id = "shutdown",
                    grace_secs = grace.as_secs(),
                    "polling runner did not stop within the grace period"
                );
            }
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
