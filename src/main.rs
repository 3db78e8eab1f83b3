//! Service registry daemon.
//!
//! Tracks service liveness from heartbeat reports and answers status queries.
//!
//! # Architecture Overview
//!
//! ```text
//!   heartbeat ──POST /bus/service.status──┐
//!                                         ▼
//!   ┌─────────┐   ┌────────┐   ┌───────────────────┐   ┌────────────┐
//!   │ gateway │──▶│  bus   │──▶│ registry manager  │──▶│ entry store│
//!   └─────────┘   └────────┘   │  report / sweep   │   └────────────┘
//!        │                     └─────────┬─────────┘
//!        │  POST /rpc/service.info       │ transitions
//!        ▼                               ▼
//!   ┌─────────┐              bus service.notice ──▶ GET /bus/service.notice/ws
//!   │   rpc   │──▶ query_status / query_status_list
//!   └─────────┘
//!
//!   lifecycle machine: serving ──signal──▶ stopping (stop sweep, close gateway)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use service_registry::config::{load_config, RegistryConfig};
use service_registry::lifecycle::{lifecycle_machine, signals, Shutdown};
use service_registry::observability::{logging, metrics};
use service_registry::registry::RegistryManager;
use service_registry::transport::{Bus, Gateway, GatewayState, RpcServer};

#[derive(Parser)]
#[command(name = "registryd")]
#[command(about = "Service liveness registry", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!("registryd v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        check_interval_secs = config.registry.check_interval_secs,
        allow_failures = config.registry.allow_failures,
        purge_delay = config.registry.purge_delay,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let bus = Bus::default();
    let rpc = Arc::new(RpcServer::new());
    let gateway_shutdown = Shutdown::new();

    let gateway = Gateway::bind(
        &config.listener,
        GatewayState {
            bus: bus.clone(),
            rpc: rpc.clone(),
            shutdown: gateway_shutdown.clone(),
        },
    )
    .await?;

    let registry = Arc::new(RegistryManager::new(
        config.registry.clone(),
        Arc::new(bus.clone()),
    ));
    registry.startup(&bus, &rpc)?;

    let machine = lifecycle_machine(registry.clone(), gateway_shutdown, &config.lifecycle)?;
    machine.start()?;

    let server = tokio::spawn(gateway.serve());

    signals::wait_for_signal().await;
    tracing::info!("Shutting down");

    let stopped = match config.lifecycle.stop_timeout() {
        Some(limit) => machine.shutdown_timeout(limit).await,
        None => machine.shutdown().await,
    };
    if let Err(e) = stopped {
        tracing::warn!(error = %e, "Lifecycle machine did not stop cleanly");
    }

    registry.shutdown().await;

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Gateway failed"),
        Err(e) => tracing::error!(error = %e, "Gateway task failed"),
    }

    tracing::info!("registryd stopped");
    Ok(())
}
