use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use parkd::config::Config;
use parkd::engine::Engine;
use parkd::http;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    parkd::observability::init(config.metrics_port)?;

    let topology = config.load_topology()?;
    let engine = Arc::new(Engine::from_spec(&topology, config.engine_options())?);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("parkd listening on {addr}");
    info!(
        "  topology: {}",
        config
            .topology_path
            .as_ref()
            .map_or("built-in demo city".to_string(), |p| p.display().to_string())
    );
    info!("  zones: {}", topology.zones.len());
    info!("  cross-zone overflow: {}", if config.cross_zone { "enabled" } else { "disabled" });
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let stop = Arc::new(Notify::new());
    let server = tokio::spawn({
        let stop = stop.clone();
        http::serve(listener, engine, async move { stop.notified().await })
    });

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight requests
    shutdown_signal().await;
    info!("shutdown signal received, draining connections...");
    stop.notify_one();

    match tokio::time::timeout(config.shutdown_grace, server).await {
        Ok(Ok(Ok(()))) => info!("all connections drained"),
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => warn!("drain timeout after {:?}, exiting anyway", config.shutdown_grace),
    }

    info!("parkd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
