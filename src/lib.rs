pub mod api;
pub mod config;
pub mod downloader;
pub mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{create_router, AppState};
use config::{config_path, load_config, validate_config};
use downloader::extractors::YtDlpProvider;
use downloader::jobs::{InMemoryJobStore, JobStore};
use downloader::orchestrator::DownloadOrchestrator;
use downloader::traits::ExtractionProvider;

/// Load configuration, wire the service together and serve until shutdown
pub async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = config_path();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    tokio::fs::create_dir_all(&config.downloads.dir)
        .await
        .with_context(|| format!("Failed to create download dir {:?}", config.downloads.dir))?;
    info!("Download directory: {:?}", config.downloads.dir);

    let provider: Arc<dyn ExtractionProvider> =
        Arc::new(YtDlpProvider::new(config.extractor.clone()));
    let provider_version = provider.version().await;
    match &provider_version {
        Some(version) => info!(provider = provider.name(), %version, "extraction provider ready"),
        None => warn!(
            provider = provider.name(),
            "yt-dlp did not report a version; downloads will fail until it is installed"
        ),
    }

    let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    if let Some(ttl) = config.downloads.job_ttl_secs {
        spawn_job_pruner(
            Arc::clone(&jobs),
            Duration::from_secs(ttl),
            Duration::from_secs(config.downloads.prune_interval_secs),
        );
    }

    let orchestrator = DownloadOrchestrator::new(provider, jobs, config.downloads.dir.clone());
    let app = create_router(Arc::new(AppState::new(orchestrator, provider_version)));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Evict idle job records every `interval`
fn spawn_job_pruner(jobs: Arc<dyn JobStore>, ttl: Duration, interval: Duration) {
    info!(ttl_secs = ttl.as_secs(), "job pruning enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = jobs.prune(ttl);
            if removed > 0 {
                info!(removed, remaining = jobs.len(), "pruned idle jobs");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
