use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hig_search::{config, domain::ingest::run_index_worker, factory, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hig_search=info,tower_http=info")),
        )
        .with(fmt::layer().with_target(false))
        .init();

    let settings = config::read_config().context("Failed to read configuration")?;
    let services = factory::build_services(&settings)?;
    let store = services.indexer.store().clone();

    // Warm start from the last snapshot, then index fresh content over it
    if let Some(path) = &settings.ingest.snapshot_path {
        store.load_snapshot(path).await;
    }
    let stats = services.indexer.sync().await;
    info!(
        indexed = stats.indexed,
        rejected = stats.rejected,
        removed = stats.removed,
        total = stats.total,
        "Initial index ready"
    );
    if let Some(path) = &settings.ingest.snapshot_path {
        if let Err(e) = store.save_snapshot(path).await {
            tracing::warn!(error = %e, "Failed to save initial index snapshot");
        }
    }

    tokio::spawn(run_index_worker(
        services.indexer,
        settings.ingest.refresh_interval(),
        settings.ingest.snapshot_path.clone(),
    ));

    let app = router::create(services.app_state, &settings.application);
    let addr: SocketAddr = format!("{}:{}", settings.application.host, settings.application.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}
