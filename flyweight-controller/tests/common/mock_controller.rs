use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use flyweight_api::command::{
    AssocCheck, AssocCommand, AssocReq, AssocResp, AssociationStatus, Command, ControlCommand,
};
use flyweight_api::{NetAddress, NetGuid, NetworkId, Packet};
use flyweight_controller::configs::Controller;
use flyweight_controller::errors::ControllerError;
use flyweight_controller::models::NetworkDevice;
use flyweight_controller::services::{
    AckIdentityMode, AddressTable, AssociationPolicy, ChannelSelection, DeviceEventSink,
    PacketDispatcher, PacketSink,
};

pub const NETWORK_ID: u8 = 2;

pub fn network_id() -> NetworkId {
    NetworkId::new(NETWORK_ID).unwrap()
}

/// Decodes and keeps everything the dispatcher sends.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Packet>>,
}

impl PacketSink for RecordingSink {
    fn send(&self, packet: Vec<u8>) -> Result<(), ControllerError> {
        self.sent.lock().unwrap().push(Packet::decode(&packet)?);
        Ok(())
    }
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub commands: Mutex<Vec<(NetGuid, ControlCommand)>>,
    pub activated: Mutex<Vec<NetGuid>>,
}

impl DeviceEventSink for RecordingEvents {
    fn on_control_command(&self, device: &Arc<NetworkDevice>, command: &ControlCommand) {
        self.commands
            .lock()
            .unwrap()
            .push((device.guid(), command.clone()));
    }

    fn on_device_became_active(&self, device: &Arc<NetworkDevice>) {
        self.activated.lock().unwrap().push(device.guid());
    }
}

/// Allows everything except GUIDs put on its deny list.
#[derive(Default)]
pub struct DenyListPolicy {
    denied: Mutex<HashSet<NetGuid>>,
}

impl DenyListPolicy {
    pub fn deny(&self, guid: u32) {
        self.denied.lock().unwrap().insert(NetGuid::new(guid));
    }
}

impl AssociationPolicy for DenyListPolicy {
    fn can_associate(&self, guid: &NetGuid) -> bool {
        !self.denied.lock().unwrap().contains(guid)
    }
}

pub struct FixedSelection(AtomicBool);

impl FixedSelection {
    pub fn set(&self, selected: bool) {
        self.0.store(selected, Ordering::SeqCst);
    }
}

impl ChannelSelection for FixedSelection {
    fn is_channel_selected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MockController {
    pub dispatcher: PacketDispatcher,
    pub table: Arc<AddressTable>,
    pub sink: Arc<RecordingSink>,
    pub events: Arc<RecordingEvents>,
    pub policy: Arc<DenyListPolicy>,
    pub selection: Arc<FixedSelection>,
}

impl MockController {
    pub async fn new(guids: &[u32]) -> Self {
        Self::with_config(guids, 8, AckIdentityMode::EchoGuid).await
    }

    pub async fn with_config(guids: &[u32], ack_queue_capacity: usize, ack_identity: AckIdentityMode) -> Self {
        let table = Arc::new(AddressTable::new());
        for guid in guids {
            table
                .register(NetworkDevice::new(NetGuid::new(*guid), 120, 1))
                .await
                .unwrap();
        }

        let sink = Arc::new(RecordingSink::default());
        let events = Arc::new(RecordingEvents::default());
        let policy = Arc::new(DenyListPolicy::default());
        let selection = Arc::new(FixedSelection(AtomicBool::new(true)));

        let config = Controller {
            network_id: network_id(),
            server_address: NetAddress::GATEWAY,
            preferred_channel: None,
            ack_queue_capacity,
            ack_identity,
        };
        let dispatcher = PacketDispatcher::new(
            &config,
            table.clone(),
            policy.clone(),
            events.clone(),
            sink.clone(),
        )
        .with_channel_selection(selection.clone());

        Self {
            dispatcher,
            table,
            sink,
            events,
            policy,
            selection,
        }
    }

    /// Feeds a packet through the byte-level entry point, as the gateway would.
    pub async fn receive(&self, packet: Packet) -> Result<(), ControllerError> {
        let frame = packet.encode().unwrap();
        self.dispatcher.handle_inbound_frame(&frame).await
    }

    /// Runs the request and check exchange, returning the assigned address.
    pub async fn associate(&self, guid: u32) -> NetAddress {
        self.receive(assoc_req(guid)).await.unwrap();
        let address = self
            .sink
            .take()
            .iter()
            .find_map(|packet| match packet.command() {
                Some(Command::Assoc(AssocCommand::Resp(resp))) => Some(resp.address),
                _ => None,
            })
            .expect("association response");

        self.receive(assoc_check(guid, address)).await.unwrap();
        let acks = self.sink.take();
        assert_eq!(ack_status(&acks[0]), AssociationStatus::Associated);
        address
    }
}

pub fn assoc_req(guid: u32) -> Packet {
    Packet::new(
        AssocCommand::Req(AssocReq {
            guid: NetGuid::new(guid).to_hex(),
            hardware_version: [1, 0, 0, 0],
            firmware_version: [1, 4, 0, 0],
            radio_protocol_version: 1,
            ..Default::default()
        }),
        NetworkId::BROADCAST,
        NetAddress::BROADCAST,
        NetAddress::GATEWAY,
    )
}

pub fn assoc_check(guid: u32, src: NetAddress) -> Packet {
    Packet::new(
        AssocCommand::Check(AssocCheck {
            guid: NetGuid::new(guid).to_hex(),
            battery_level: 200,
        }),
        network_id(),
        src,
        NetAddress::GATEWAY,
    )
}

pub fn assoc_resp(packet: &Packet) -> &AssocResp {
    match packet.command() {
        Some(Command::Assoc(AssocCommand::Resp(resp))) => resp,
        other => panic!("expected association response, got {:?}", other),
    }
}

pub fn ack_status(packet: &Packet) -> AssociationStatus {
    match packet.command() {
        Some(Command::Assoc(AssocCommand::Ack(ack))) => ack.status,
        other => panic!("expected association ack, got {:?}", other),
    }
}
