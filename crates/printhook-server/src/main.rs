mod api;
mod config;
mod notices;

use api::state::AppContext;
use config::ServerConfig;
use notices::RecentNotices;
use printhook_core::hooks::{
    EventPipeline, HookRegistry, HttpSnapshotProvider, SharedJobInfo, WebhookDispatcher,
};
use printhook_core::storage::HookStorage;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,printhook_server=debug,printhook_core=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting PrintHook server");

    let config = ServerConfig::load()?;
    let storage = HookStorage::new(&config.hooks_path);
    let hooks = storage.load()?;
    tracing::info!(count = hooks.len(), path = %config.hooks_path.display(), "Hooks loaded");

    let notices = Arc::new(RecentNotices::default());
    let job_info = Arc::new(SharedJobInfo::new());
    let dispatcher = WebhookDispatcher::new(config.dispatcher_config(), notices.clone())?;

    let mut pipeline = EventPipeline::new(Arc::new(HookRegistry::new(hooks)), dispatcher)
        .with_job_info(job_info.clone());
    if let Some(url) = &config.snapshot_url {
        tracing::info!(url = %url, "Webcam snapshots enabled");
        let provider = HttpSnapshotProvider::new(url.clone(), config.dispatcher_config().timeout)?;
        pipeline = pipeline.with_snapshot_provider(Arc::new(provider));
    }

    let state = Arc::new(AppContext {
        pipeline: pipeline.clone(),
        storage,
        job_info,
        notices,
        save_lock: tokio::sync::Mutex::new(()),
    });
    let app = api::router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("PrintHook running on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Waiting for in-flight deliveries");
    pipeline.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
