use flyweight_api::command::{AssocReq, SystemStatus};
use flyweight_api::{NetAddress, NetGuid};
use tokio::sync::Mutex;

/// Association lifecycle of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceState {
    /// Registered but never heard from, or reset by a removal
    #[default]
    Unassociated,
    /// Association request accepted, address not yet sent
    Setup,
    /// Association response sent, waiting for the first check
    AssignSent,
    /// Device confirmed its address and is running
    Started,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceStatus {
    pub state: DeviceState,
    pub address: Option<NetAddress>,
    /// Last inbound ACK-ID acted upon, for duplicate suppression
    pub last_ack_id: Option<u8>,
    pub battery_level: Option<u8>,
    pub hardware_version: Option<[u8; 4]>,
    pub firmware_version: Option<[u8; 4]>,
    pub radio_protocol_version: Option<u8>,
    pub system_status: SystemStatus,
}

/// Server-side record of one physical device.
#[derive(Debug)]
pub struct NetworkDevice {
    guid: NetGuid,
    sleep_seconds: u16,
    scanner_type: u8,
    status: Mutex<DeviceStatus>,
}

impl NetworkDevice {
    pub fn new(guid: NetGuid, sleep_seconds: u16, scanner_type: u8) -> Self {
        Self {
            guid,
            sleep_seconds,
            scanner_type,
            status: Mutex::new(DeviceStatus::default()),
        }
    }

    pub fn guid(&self) -> NetGuid {
        self.guid
    }

    pub fn sleep_seconds(&self) -> u16 {
        self.sleep_seconds
    }

    pub fn scanner_type(&self) -> u8 {
        self.scanner_type
    }

    /// Snapshot of the mutable fields.
    pub async fn status(&self) -> DeviceStatus {
        self.status.lock().await.clone()
    }

    pub async fn state(&self) -> DeviceState {
        self.status.lock().await.state
    }

    pub async fn set_state(&self, state: DeviceState) {
        self.status.lock().await.state = state;
    }

    pub async fn address(&self) -> Option<NetAddress> {
        self.status.lock().await.address
    }

    /// Only the address table writes this, inside its own critical section.
    pub(crate) async fn set_address(&self, address: Option<NetAddress>) {
        self.status.lock().await.address = address;
    }

    pub async fn set_battery_level(&self, level: u8) {
        self.status.lock().await.battery_level = Some(level);
    }

    pub async fn record_association_request(&self, req: &AssocReq) {
        let mut status = self.status.lock().await;
        status.hardware_version = Some(req.hardware_version);
        status.firmware_version = Some(req.firmware_version);
        status.radio_protocol_version = Some(req.radio_protocol_version);
        status.system_status = req.system_status;
    }

    /// Records `ack_id` as processed. Returns false when it repeats the last one.
    pub async fn accept_ack_id(&self, ack_id: u8) -> bool {
        let mut status = self.status.lock().await;
        if status.last_ack_id == Some(ack_id) {
            return false;
        }
        status.last_ack_id = Some(ack_id);
        true
    }

    /// Back to a freshly registered record, keeping nothing learned over the air.
    pub(crate) async fn reset(&self) {
        *self.status.lock().await = DeviceStatus::default();
    }
}
