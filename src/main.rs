use anyhow::Context;
use std::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gateway_control_plane::config::AppConfig;
use gateway_control_plane::storage::{Proxy, Snapshot};
use gateway_control_plane::xds::ProxyTranslator;

fn main() -> anyhow::Result<()> {
    // Load configuration before logging so the configured level applies
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.control_plane.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = load_error {
        warn!("⚠️  Could not load configuration, using defaults: {:#}", e);
    }

    info!("🚀 Gateway control plane starting...");

    let input = &config.control_plane.input;
    let proxy: Proxy = serde_yaml::from_str(
        &fs::read_to_string(&input.proxy_path)
            .with_context(|| format!("reading proxy from {}", input.proxy_path.display()))?,
    )
    .with_context(|| format!("parsing proxy from {}", input.proxy_path.display()))?;
    let snapshot: Snapshot = serde_yaml::from_str(
        &fs::read_to_string(&input.snapshot_path)
            .with_context(|| format!("reading snapshot from {}", input.snapshot_path.display()))?,
    )
    .with_context(|| format!("parsing snapshot from {}", input.snapshot_path.display()))?;

    info!(
        "📦 Loaded proxy {} with {} listeners; snapshot has {} upstreams, {} upstream groups, {} secrets",
        proxy.metadata,
        proxy.listeners.len(),
        snapshot.upstream_count(),
        snapshot.upstream_group_count(),
        snapshot.secret_count()
    );

    let translator = ProxyTranslator::new(config.envoy_generation.clone());
    let translation = translator.translate(&proxy, &snapshot);

    for listener in &translation.resources.listeners {
        info!(
            "🎧 Listener {}: {} filter chains",
            listener.name,
            listener.filter_chains.len()
        );
    }
    for route_config in &translation.resources.route_configurations {
        info!(
            "🛣️  Route configuration {}: {} virtual hosts",
            route_config.name,
            route_config.virtual_hosts.len()
        );
    }

    if translation.report.has_errors() {
        warn!("❌ Translation finished with errors");
    } else if translation.report.has_warnings() {
        warn!("⚠️  Translation finished with warnings");
    } else {
        info!("✅ Translation finished cleanly");
    }

    println!("{}", serde_json::to_string_pretty(&translation.report)?);

    Ok(())
}
