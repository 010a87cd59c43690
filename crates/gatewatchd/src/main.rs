use anyhow::Result;
use tracing_subscriber::EnvFilter;

use gatewatchd::config::Config;
use gatewatchd::providers::IdentityStore;
use gatewatchd::store::FsIdentityStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("gatewatchd starting");

    let config = Config::from_env();
    tracing::info!(
        labels_dir = %config.labels_dir.display(),
        threshold = config.match_threshold,
        cooldown_ms = config.cooldown_ms,
        tick_ms = config.tick_ms,
        "configuration loaded"
    );

    let store = FsIdentityStore::new(&config.labels_dir);
    match store.list_labels().await {
        Ok(labels) => tracing::info!(count = labels.len(), ?labels, "enrolled identities on disk"),
        Err(err) => tracing::warn!(error = %err, "could not read the label store"),
    }

    // TODO: wire a FaceEngine backend and per-gate FrameSources, bootstrap
    // the matcher from the label store via EnrollmentPipeline, and spawn
    // the entrance/exit Gate tasks.

    tracing::info!("gatewatchd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("gatewatchd shutting down");

    Ok(())
}
