use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auto_release_bot::config::Config;
use auto_release_bot::github::GitHubAppClientCreator;
use auto_release_bot::metrics::InMemoryMetrics;
use auto_release_bot::pipeline::PullRequestHandler;
use auto_release_bot::release_manager::ReleaseManagerClient;
use auto_release_bot::server::{AppState, build_router};

/// Comments on pull requests with the environments a merge will auto-release to.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, env = "CONFIG_PATH", default_value = "config.yml")]
    config_path: PathBuf,

    /// Bind address, overriding `server.address` and `server.port`.
    #[arg(long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auto_release_bot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config_path)?;
    config.validate()?;

    let metrics = Arc::new(InMemoryMetrics::new());

    let release_manager = ReleaseManagerClient::new(config.release_manager_client(), metrics.clone())
        .context("building release manager client")?;
    let github = GitHubAppClientCreator::new(&config.github_app(), metrics.clone())
        .context("building GitHub App client")?;

    let handler = PullRequestHandler::new(
        github,
        release_manager,
        config.pipeline_settings(),
        metrics.clone(),
    );

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        handler,
        config.github.webhook_secret.as_bytes(),
        metrics,
        shutdown.clone(),
    );
    let app = build_router(state);

    let addr = args.address.unwrap_or_else(|| config.bind_address());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("serving HTTP")?;

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, cancelling in-flight deliveries first.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
