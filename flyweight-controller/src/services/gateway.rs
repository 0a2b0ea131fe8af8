use std::net::SocketAddr;
use std::sync::Arc;

use embedded_io_adapters::tokio_1::FromTokio;
use flyweight_api::transport::{AsyncPacketTransport, TransportError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use crate::services::dispatcher::PacketDispatcher;

/// TCP listener for the radio gateway.
///
/// Serves one gateway connection at a time. Frames read from it go to the
/// dispatcher and queued outbound packets are written back; anything queued
/// while no gateway is connected stays queued.
pub struct GatewayServer {
    addr: SocketAddr,
    dispatcher: Arc<PacketDispatcher>,
}

impl GatewayServer {
    pub fn new(addr: SocketAddr, dispatcher: Arc<PacketDispatcher>) -> Self {
        Self { addr, dispatcher }
    }

    pub async fn start(
        &self,
        mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Result<(SocketAddr, oneshot::Sender<()>), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Gateway listener on {}", local_addr);

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::info!("Gateway listener shutting down");
                        break;
                    },
                    accept_result = listener.accept() => {
                        let (stream, peer) = match accept_result {
                            Ok(accepted) => accepted,
                            Err(e) => {
                                tracing::error!("Failed to accept gateway connection: {}", e);
                                continue;
                            }
                        };

                        tokio::select! {
                            _ = &mut stop_rx => {
                                tracing::info!("Gateway listener shutting down");
                                break;
                            },
                            _ = Self::handle_connection(stream, peer, &dispatcher, &mut outbound) => {},
                        }
                    }
                }
            }
        });

        Ok((local_addr, stop_tx))
    }

    async fn handle_connection(
        stream: TcpStream,
        peer: SocketAddr,
        dispatcher: &PacketDispatcher,
        outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        tracing::info!("Gateway connected from {}", peer);

        let (reader, writer) = stream.into_split();
        let mut rx = AsyncPacketTransport::new(FromTokio::new(reader));
        let mut tx = AsyncPacketTransport::new(FromTokio::new(writer));

        loop {
            tokio::select! {
                frame = rx.receive_frame() => match frame {
                    Ok(frame) => {
                        match dispatcher.handle_inbound_frame(&frame).await {
                            Ok(()) => {}
                            Err(e) if e.is_surfaced() => {
                                tracing::error!("Inbound packet from gateway failed: {}", e)
                            }
                            Err(e) => tracing::warn!("Inbound packet from gateway failed: {}", e),
                        }
                    }
                    Err(TransportError::FrameOverflow(len)) => {
                        tracing::warn!("Discarded {} bytes of unterminated frame", len);
                    }
                    Err(TransportError::Closed) => break,
                    Err(e) => {
                        tracing::warn!("Failed to receive from gateway {}: {}", peer, e);
                        break;
                    }
                },
                Some(packet) = outbound.recv() => {
                    if let Err(e) = tx.send_frame(&packet).await {
                        tracing::warn!("Failed to send to gateway {}: {}", peer, e);
                        break;
                    }
                },
            }
        }

        tracing::info!("Gateway {} disconnected", peer);
    }
}
