mod config;
mod zone;
mod zone_manager;
mod mdns;
mod api;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use shared::protocol::{MDNS_IPV4, MDNS_IPV6};
use shared::registry::ServiceTypeRegistry;
use shared::types::ServiceType;
use crate::config::Config;
use crate::mdns::connector::{Backoff, Connector};
use crate::zone_manager::ZoneHandle;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("zeroconfd=info"))
        )
        .init();

    tracing::info!("Starting zeroconfd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/zeroconfd/zeroconfd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let mut registry = ServiceTypeRegistry::with_well_known();
    for custom in &config.service_types {
        let service_type = ServiceType::new(custom.name.clone(), custom.protocol);
        if registry.register(custom.key.clone(), service_type).is_some() {
            tracing::info!("Overriding service type {}", custom.key);
        }
    }

    let host = mdns::publish::local_host(&config.host)?;
    let services = mdns::publish::configured_services(&host, &config.services, &registry)?;

    // Start zone thread and publish our services
    let zone = ZoneHandle::spawn(config.zone.mailbox_capacity);
    for service in &services {
        mdns::publish::publish(&zone, service).await?;
    }

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Bind one responder per multicast group; failing here is fatal
    let backoff = Backoff::new(
        Duration::from_secs(config.responder.restart_backoff_secs),
        Duration::from_secs(config.responder.max_restart_backoff_secs),
    );
    let mut groups = Vec::new();
    if config.responder.ipv4 {
        groups.push(MDNS_IPV4);
    }
    if config.responder.ipv6 {
        groups.push(MDNS_IPV6);
    }

    let mut stats = Vec::new();
    let mut responder_handles = Vec::new();
    for group in groups {
        let socket = mdns::socket::bind_multicast(group)
            .with_context(|| format!("Failed to listen on {}", group))?;
        let connector = Connector::new(group, zone.clone(), config.responder.queue_capacity);
        stats.push(connector.stats());
        responder_handles.push(tokio::spawn(connector.supervise(socket, backoff, cancel.clone())));
    }

    // Spawn discovery browser task
    let browser_handle = if config.zone.browse {
        let browser_zone = zone.clone();
        let browser_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            match mdns::browser::run_browser(&browser_zone, browser_cancel).await {
                Ok(discovered) => tracing::info!("mDNS browser saw {} learned records", discovered),
                Err(e) => tracing::error!("mDNS browser error: {}", e),
            }
        }))
    } else {
        None
    };

    // Spawn zone maintenance task
    let mgr_cancel = cancel.clone();
    let mgr_config = config.zone.clone();
    let mgr_zone = zone.clone();
    let mgr_handle = tokio::spawn(async move {
        if let Err(e) = zone_manager::run(mgr_zone, mgr_config, mgr_cancel).await {
            tracing::error!("Zone maintenance error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        zone: zone.clone(),
        host: Arc::new(host),
        services: Arc::new(services.iter().map(|s| s.instance_name()).collect()),
        stats,
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    futures::future::join_all(responder_handles).await;
    if let Some(handle) = browser_handle {
        let _ = handle.await;
    }
    let _ = tokio::join!(mgr_handle, server_handle);

    // Shutdown zone thread
    if let Err(e) = zone.shutdown().await {
        tracing::error!("Failed to shutdown zone: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
