mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use huddle_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use huddle_core::config::LogFormat::*;
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
    // Logging needs the loaded config, so config errors surface on stderr only.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config, bootstrap::Collaborators::default()).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.router.clone(),
    )
    .await?;

    let graceful_shutdown = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let update_runner = app.runner;
    let runner = tokio::spawn(async move { update_runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "huddle-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = graceful_shutdown.as_secs(),
        "huddle-server stopping"
    );

    if tokio::time::timeout(graceful_shutdown, runner).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "update runner did not finish within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
