use std::sync::Arc;

use flyweight_api::command::{AssocAck, AssocCommand, AssociationStatus, Command, NetMgmtCommand};
use flyweight_api::packet::AckData;
use flyweight_api::{CommandGroup, NetAddress, NetGuid, NetworkId, Packet, PacketBody};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::configs::Controller;
use crate::errors::ControllerError;
use crate::models::NetworkDevice;
use crate::services::ack_service::{AckService, AckState, PendingPacket};
use crate::services::address_table::AddressTable;
use crate::services::association::AssociationService;
use crate::services::channel_survey::ChannelSurveyor;
use crate::services::listeners::{AssociationPolicy, ChannelSelection, DeviceEventSink, PacketSink};

/// Identity carried in the association ack that answers an inbound ACK-ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckIdentityMode {
    /// The private marker, as early radio firmware expects
    Zeros,
    /// The device's own GUID
    #[default]
    EchoGuid,
}

/// Entry point for every packet crossing the gateway link.
pub struct PacketDispatcher {
    network_id: NetworkId,
    server_address: NetAddress,
    identity: AckIdentityMode,
    table: Arc<AddressTable>,
    acks: Arc<AckService>,
    association: AssociationService,
    surveyor: Arc<ChannelSurveyor>,
    channel_selection: Arc<dyn ChannelSelection>,
    events: Arc<dyn DeviceEventSink>,
    sink: Arc<dyn PacketSink>,
}

impl PacketDispatcher {
    pub fn new(
        config: &Controller,
        table: Arc<AddressTable>,
        policy: Arc<dyn AssociationPolicy>,
        events: Arc<dyn DeviceEventSink>,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        let acks = Arc::new(AckService::new(config.ack_queue_capacity));
        let surveyor = Arc::new(
            ChannelSurveyor::new(config.network_id, config.server_address)
                .with_preferred_channel(config.preferred_channel),
        );
        let association = AssociationService::new(
            config.network_id,
            config.server_address,
            table.clone(),
            acks.clone(),
            policy,
            events.clone(),
        );

        Self {
            network_id: config.network_id,
            server_address: config.server_address,
            identity: config.ack_identity,
            table,
            acks,
            association,
            channel_selection: surveyor.clone(),
            surveyor,
            events,
            sink,
        }
    }

    /// Replaces the surveyor as the gate for association and control traffic.
    pub fn with_channel_selection(mut self, selection: Arc<dyn ChannelSelection>) -> Self {
        self.channel_selection = selection;
        self
    }

    pub fn table(&self) -> &Arc<AddressTable> {
        &self.table
    }

    pub fn acks(&self) -> &Arc<AckService> {
        &self.acks
    }

    pub fn surveyor(&self) -> &Arc<ChannelSurveyor> {
        &self.surveyor
    }

    pub async fn select_channel(&self) -> Result<u8, ControllerError> {
        self.surveyor.select_channel(self.sink.as_ref()).await
    }

    /// Decodes one gateway frame and dispatches it. Malformed frames are dropped.
    pub async fn handle_inbound_frame(&self, frame: &[u8]) -> Result<(), ControllerError> {
        match Packet::decode(frame) {
            Ok(packet) => self.handle_inbound(packet).await,
            Err(e) => {
                warn!("Dropping malformed packet ({} bytes): {}", frame.len(), e);
                Ok(())
            }
        }
    }

    /// Handles one inbound packet.
    ///
    /// Only a full address table is reported back; every other failure is
    /// logged and absorbed here.
    pub async fn handle_inbound(&self, packet: Packet) -> Result<(), ControllerError> {
        if packet.src == self.server_address {
            debug!("Ignoring own packet: {}", packet);
            return Ok(());
        }

        let command = match &packet.body {
            PacketBody::Ack(data) => {
                self.handle_ack(&packet, *data).await;
                return Ok(());
            }
            PacketBody::Command(command) => command,
        };
        log_packet("Inbound", &packet, command);

        if !packet.has_ack_id() {
            return self.dispatch(&packet, command).await;
        }

        let Some(device) = self.table.device_by_address(packet.src).await else {
            warn!("Cannot ACK packet from unknown address {}: {}", packet.src, packet);
            return Ok(());
        };

        let result = if device.accept_ack_id(packet.ack_id).await {
            self.dispatch(&packet, command).await
        } else {
            warn!(
                "ACKed, but did not process duplicate ackid {} from {}",
                packet.ack_id,
                device.guid()
            );
            Ok(())
        };

        self.respond_to_ack(&packet, &device);
        result
    }

    async fn handle_ack(&self, packet: &Packet, data: AckData) {
        debug!("Inbound ACK {} from {}", packet.ack_id, packet.src);
        if self
            .acks
            .reconcile(packet.src, packet.ack_id, data)
            .await
            .is_none()
        {
            debug!("No pending packet for ACK {} from {}", packet.ack_id, packet.src);
        }
    }

    fn respond_to_ack(&self, packet: &Packet, device: &NetworkDevice) {
        let guid = match self.identity {
            AckIdentityMode::Zeros => NetGuid::PRIVATE_TEXT.into(),
            AckIdentityMode::EchoGuid => device.guid().to_hex(),
        };
        let ack = Packet::new(
            AssocCommand::Ack(AssocAck {
                guid,
                status: AssociationStatus::Associated,
            }),
            self.network_id,
            self.server_address,
            packet.src,
        )
        .with_ack_id(packet.ack_id);

        self.reply(ack);
    }

    async fn dispatch(&self, packet: &Packet, command: &Command) -> Result<(), ControllerError> {
        match command {
            Command::NetMgmt(NetMgmtCommand::Check(check)) => {
                if let Some(reply) = self.surveyor.handle_net_check(check).await {
                    self.reply(reply);
                }
            }
            Command::NetMgmt(NetMgmtCommand::Setup { .. } | NetMgmtCommand::IntfTest { .. }) => {}
            Command::Assoc(command) => {
                if !self.channel_selection.is_channel_selected() {
                    debug!("No channel selected, ignoring association opcode {}", command.opcode());
                    return Ok(());
                }
                if let Some(reply) = self.association.handle(packet.src, command).await? {
                    self.reply(reply);
                }
            }
            Command::Control(command) => {
                if !self.channel_selection.is_channel_selected() {
                    debug!("No channel selected, ignoring control from {}", packet.src);
                    return Ok(());
                }
                match self.table.device_by_address(packet.src).await {
                    Some(device) => self.events.on_control_command(&device, command),
                    None => warn!("Control command from unknown address {}", packet.src),
                }
            }
        }
        Ok(())
    }

    /// Sends a packet, tracking it for acknowledgment when its command asks for one.
    pub async fn handle_outbound(&self, packet: Packet) -> Result<Option<Arc<PendingPacket>>, ControllerError> {
        let tracked = packet.command().is_some_and(Command::requires_ack) && !packet.is_broadcast();
        if !tracked {
            self.transmit(&packet)?;
            return Ok(None);
        }

        let pending = self.acks.enqueue(packet).await;
        self.transmit(pending.packet())?;
        pending.record_send().await;
        Ok(Some(pending))
    }

    /// Sends a tracked packet again with its original ACK-ID.
    ///
    /// Returns false without sending once the packet is no longer pending.
    pub async fn retransmit(&self, pending: &PendingPacket) -> Result<bool, ControllerError> {
        if pending.state().await != AckState::Pending {
            return Ok(false);
        }
        self.transmit(pending.packet())?;
        pending.record_send().await;
        Ok(true)
    }

    fn transmit(&self, packet: &Packet) -> Result<(), ControllerError> {
        if let Some(command) = packet.command() {
            log_packet("Outbound", packet, command);
        }
        self.sink.send(packet.encode()?)
    }

    fn reply(&self, packet: Packet) {
        if let Err(e) = self.transmit(&packet) {
            warn!("Failed to send reply to {}: {}", packet.dst, e);
        }
    }
}

fn log_packet(direction: &str, packet: &Packet, command: &Command) {
    if command.group() == CommandGroup::NetMgmt {
        debug!("{} packet: {}", direction, packet);
    } else {
        info!("{} packet: {}", direction, packet);
    }
}
