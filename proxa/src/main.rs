use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use proxa_config::ProxaConfig;
use proxa_core::Master;
use proxa_proxy::{HttpOrigin, ProxyHandler};
use proxa_store::{KeyValueStore, RedisStore};
use tracing::info;
use utils::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = ProxaConfig::from_file_or_default("proxa.toml");
    let report = cfg.validate();
    if report.has_errors() {
        anyhow::bail!("invalid configuration:\n{}", report.format());
    }
    if !report.warnings().is_empty() {
        eprintln!("⚠️  Config warnings:\n{}", report.format());
    }
    cfg.print();

    // The store must be reachable before any request handling starts; a
    // failed connection is fatal to startup, never silently degraded.
    let store = RedisStore::connect(&cfg.store.host, cfg.store.port, cfg.store.db)
        .await
        .context("store connection failed at startup")?;
    let store: Arc<dyn KeyValueStore> = Arc::new(store);

    let origin_client = HttpOrigin::new(Duration::from_secs(cfg.origin.fetch_timeout_secs))
        .context("failed to build origin client")?;

    let handler = ProxyHandler::new(
        store.clone(),
        Arc::new(origin_client),
        cfg.origin.address.clone(),
        Duration::from_secs(cfg.cache.default_ttl_secs),
    );

    let master = Master::new(cfg, handler);
    tokio::select! {
        res = master.run() => res?,
        _ = tokio::signal::ctrl_c() => {
            info!(target: "proxa::master", "Shutdown signal received");
        }
    }

    // Closed exactly once, after the listener stops accepting work.
    store.close().await;
    Ok(())
}
