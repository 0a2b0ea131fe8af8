use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use embedded_io_adapters::tokio_1::FromTokio;
use flyweight_api::command::{AssocCommand, Command};
use flyweight_api::transport::AsyncPacketTransport;
use flyweight_api::{NetAddress, NetGuid};
use flyweight_controller::configs::Controller;
use flyweight_controller::models::NetworkDevice;
use flyweight_controller::services::{
    AckIdentityMode, AddressTable, AllowAll, GatewayServer, LogEvents, PacketDispatcher, QueueSink,
};
use tokio::net::TcpStream;

mod common;
use common::mock_controller::{assoc_req, network_id};

#[tokio::test]
async fn test_gateway_round_trip() {
    let table = Arc::new(AddressTable::new());
    table
        .register(NetworkDevice::new(NetGuid::new(0x7FE), 60, 0))
        .await
        .unwrap();

    let (sink, outbound) = QueueSink::new();
    let config = Controller {
        network_id: network_id(),
        server_address: NetAddress::GATEWAY,
        preferred_channel: Some(4),
        ack_queue_capacity: 8,
        ack_identity: AckIdentityMode::EchoGuid,
    };
    let dispatcher = Arc::new(PacketDispatcher::new(
        &config,
        table,
        Arc::new(AllowAll),
        Arc::new(LogEvents),
        Arc::new(sink),
    ));
    // Queued before any gateway is connected
    assert_eq!(dispatcher.select_channel().await.unwrap(), 4);

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (local_addr, stop_tx) = GatewayServer::new(addr, dispatcher.clone())
        .start(outbound)
        .await
        .unwrap();

    let stream = TcpStream::connect(local_addr).await.unwrap();
    let mut gateway = AsyncPacketTransport::new(FromTokio::new(stream));

    let setup = tokio::time::timeout(Duration::from_secs(5), gateway.receive_packet())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(setup.command(), Some(Command::NetMgmt(_))));

    // Garbage first, then a real request; the link survives the bad frame
    gateway.send_frame(&[0xFF, 0x00]).await.unwrap();
    gateway.send_packet(&assoc_req(0x7FE)).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), gateway.receive_packet())
        .await
        .unwrap()
        .unwrap();
    match reply.command() {
        Some(Command::Assoc(AssocCommand::Resp(resp))) => {
            assert_eq!(resp.address, NetAddress::new(254));
        }
        other => panic!("expected association response, got {:?}", other),
    }

    stop_tx.send(()).unwrap();
}
