use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use genesis_observability::LogManager;
use genesis_relay::cli::Cli;
use genesis_relay::{RelayContext, RelayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = cli.load_config().await.context("Invalid configuration")?;
    let _log_manager = LogManager::init(&genesis_observability::LoggingConfig::from(&config.logging))
        .context("Failed to initialize logging")?;

    if config.realtime.api_key.is_none() {
        error!("OPENAI_API_KEY is not set, voice sessions will be closed on connect");
    }

    let ctx = RelayContext::new(config).context("Failed to build relay context")?;
    let server = RelayServer::bind(ctx).await.context("Failed to bind listener")?;
    info!("Genesis relay running on {}", server.local_addr());

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    server.run(shutdown).await?;
    info!("Genesis relay stopped");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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
    shutdown.cancel();
}
