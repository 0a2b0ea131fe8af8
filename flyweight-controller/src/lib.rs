use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::configs::Settings;
use crate::models::NetworkDevice;
use crate::services::{AddressTable, AllowAll, GatewayServer, LogEvents, PacketDispatcher, QueueSink};

pub mod configs;
pub mod errors;
pub mod models;
pub mod services;

pub async fn run(settings: &Arc<Settings>) -> anyhow::Result<()> {
    let table = Arc::new(AddressTable::new());
    for entry in &settings.devices {
        table
            .register(NetworkDevice::new(entry.guid, entry.sleep_seconds, entry.scanner_type))
            .await?;
    }
    tracing::info!("{} devices registered", settings.devices.len());

    let (sink, outbound) = QueueSink::new();
    let dispatcher = Arc::new(PacketDispatcher::new(
        &settings.controller,
        table,
        Arc::new(AllowAll),
        Arc::new(LogEvents),
        Arc::new(sink),
    ));

    let ip_addr = settings.gateway.host.parse::<IpAddr>()?;
    let address = SocketAddr::from((ip_addr, settings.gateway.port));
    let (_, stop_tx) = GatewayServer::new(address, dispatcher.clone())
        .start(outbound)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    // Frames queue up until the gateway connects
    let survey = tokio::spawn(async move {
        match dispatcher.select_channel().await {
            Ok(channel) => tracing::info!("Operating on channel {}", channel),
            Err(e) => tracing::error!("Channel selection failed: {}", e),
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    survey.abort();
    let _ = stop_tx.send(());
    Ok(())
}
