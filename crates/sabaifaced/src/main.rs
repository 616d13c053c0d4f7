use std::sync::Arc;

use anyhow::{Context, Result};
use sabaiface_core::{Extractor, ExtractorError, MemoryStore, OnnxExtractor};
use sabaifaced::{create_router_with_config, spawn_engine, AppState, Config, EngineSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        model_dir = %config.model_dir.display(),
        pack = %config.model_pack,
        metric = %config.metric,
        recycle_interval = config.recycle_interval,
        "sabaifaced starting"
    );

    let pack = config.model_pack();
    if !pack.is_installed() {
        tracing::warn!(dir = %pack.dir().display(), "model pack files missing");
    }
    let loader = move || -> Result<Box<dyn Extractor>, ExtractorError> {
        Ok(Box::new(OnnxExtractor::load(&pack)?))
    };

    let (engine, fatal) = spawn_engine(
        Box::new(loader),
        EngineSettings {
            recycle_interval: config.recycle_interval,
            max_faces_cap: config.max_faces,
            queue_depth: config.engine_queue_depth,
        },
    )
    .context("failed to start inference engine")?;

    // A failed reload leaves no extractor to serve with; exit so the
    // supervisor restarts the process.
    tokio::spawn(async move {
        if let Ok(err) = fatal.await {
            tracing::error!(error = %err, "extractor recycle failed, exiting");
            std::process::exit(1);
        }
    });

    let state = AppState::new(&config, Arc::new(MemoryStore::new()), engine)
        .context("failed to build HTTP client")?;
    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "sabaifaced ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("sabaifaced shutting down");
        })
        .await?;

    Ok(())
}
