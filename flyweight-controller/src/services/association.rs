use std::sync::Arc;

use flyweight_api::command::{
    AssocAck, AssocCheck, AssocCommand, AssocReq, AssocResp, AssociationStatus,
};
use flyweight_api::{NetAddress, NetGuid, NetworkId, Packet};
use tracing::{debug, info, warn};

use crate::errors::ControllerError;
use crate::models::DeviceState;
use crate::services::ack_service::AckService;
use crate::services::address_table::AddressTable;
use crate::services::listeners::{AssociationPolicy, DeviceEventSink};

/// Drives devices from an association request through to `Started`.
///
/// Handlers return the reply to send, if any; the caller owns the transport.
pub struct AssociationService {
    network_id: NetworkId,
    server_address: NetAddress,
    table: Arc<AddressTable>,
    acks: Arc<AckService>,
    policy: Arc<dyn AssociationPolicy>,
    events: Arc<dyn DeviceEventSink>,
}

impl AssociationService {
    pub fn new(
        network_id: NetworkId,
        server_address: NetAddress,
        table: Arc<AddressTable>,
        acks: Arc<AckService>,
        policy: Arc<dyn AssociationPolicy>,
        events: Arc<dyn DeviceEventSink>,
    ) -> Self {
        Self {
            network_id,
            server_address,
            table,
            acks,
            policy,
            events,
        }
    }

    pub async fn handle(&self, src: NetAddress, command: &AssocCommand) -> Result<Option<Packet>, ControllerError> {
        match command {
            AssocCommand::Req(req) => self.handle_req(req).await,
            AssocCommand::Check(check) => Ok(self.handle_check(src, check).await),
            // Only ever sent by the server
            AssocCommand::Resp(_) | AssocCommand::Ack(_) => Ok(None),
        }
    }

    pub async fn handle_req(&self, req: &AssocReq) -> Result<Option<Packet>, ControllerError> {
        let guid = match NetGuid::parse(&req.guid) {
            Ok(guid) => guid,
            Err(e) => {
                warn!("Dropping association request: {}", e);
                return Ok(None);
            }
        };

        if !self.policy.can_associate(&guid) {
            debug!("Association of {} refused by policy", guid);
            return Ok(None);
        }

        let Some(device) = self.table.device_by_guid(&guid).await else {
            debug!("Association request from unregistered device {}", guid);
            return Ok(None);
        };

        device.set_state(DeviceState::Setup).await;
        device.record_association_request(req).await;
        debug!(
            "Device {} hw {:?} fw {:?} status: {}",
            guid, req.hardware_version, req.firmware_version, req.system_status
        );

        let address = match self.table.assign_address(&guid).await {
            Ok(address) => address,
            Err(e) => {
                device.set_state(DeviceState::Unassociated).await;
                return Err(e);
            }
        };

        // The device has no address yet, so it listens on broadcast
        let response = AssocResp {
            guid: req.guid.clone(),
            address,
            network_id: self.network_id,
            sleep_seconds: device.sleep_seconds(),
            scanner_type: device.scanner_type(),
        };
        device.set_state(DeviceState::AssignSent).await;
        info!("Assigning address {} to {} on network {}", address, guid, self.network_id);

        Ok(Some(Packet::new(
            AssocCommand::Resp(response),
            NetworkId::BROADCAST,
            self.server_address,
            NetAddress::BROADCAST,
        )))
    }

    pub async fn handle_check(&self, src: NetAddress, check: &AssocCheck) -> Option<Packet> {
        let guid = match NetGuid::parse(&check.guid) {
            Ok(guid) => guid,
            Err(e) => {
                warn!("Dropping association check: {}", e);
                return None;
            }
        };

        let Some(device) = self.table.device_by_guid(&guid).await else {
            debug!("Association check from unregistered device {}", guid);
            return None;
        };
        device.set_battery_level(check.battery_level).await;

        let owner = self.table.device_by_address(src).await;
        let status = if !owner.is_some_and(|owner| Arc::ptr_eq(&owner, &device)) {
            debug!("Device {} checked in from {} which it does not own", guid, src);
            AssociationStatus::NotAssociated
        } else {
            match device.state().await {
                DeviceState::Unassociated | DeviceState::Setup => AssociationStatus::NotAssociated,
                DeviceState::AssignSent => {
                    let dropped = self.acks.clear(src).await;
                    device.set_state(DeviceState::Started).await;
                    info!("Device {} started at {} ({} stale ACKs dropped)", guid, src, dropped);
                    self.events.on_device_became_active(&device);
                    AssociationStatus::Associated
                }
                DeviceState::Started => AssociationStatus::Associated,
            }
        };

        Some(Packet::new(
            AssocCommand::Ack(AssocAck {
                guid: check.guid.clone(),
                status,
            }),
            self.network_id,
            self.server_address,
            src,
        ))
    }
}
