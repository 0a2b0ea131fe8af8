//! Seams between the protocol core and the rest of the system.
//!
//! All callbacks run on the packet handling task and must not block.

use std::sync::Arc;

use flyweight_api::NetGuid;
use flyweight_api::command::ControlCommand;
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::ControllerError;
use crate::models::NetworkDevice;

/// Outbound transport: takes one encoded packet at a time.
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: Vec<u8>) -> Result<(), ControllerError>;
}

/// Application logic that consumes delivered commands.
pub trait DeviceEventSink: Send + Sync {
    fn on_control_command(&self, device: &Arc<NetworkDevice>, command: &ControlCommand);

    fn on_device_became_active(&self, device: &Arc<NetworkDevice>);
}

pub trait AssociationPolicy: Send + Sync {
    fn can_associate(&self, guid: &NetGuid) -> bool;
}

pub trait ChannelSelection: Send + Sync {
    fn is_channel_selected(&self) -> bool;
}

/// Lets every registered device associate.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AssociationPolicy for AllowAll {
    fn can_associate(&self, _guid: &NetGuid) -> bool {
        true
    }
}

/// Reports device events to the log; used when no application is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl DeviceEventSink for LogEvents {
    fn on_control_command(&self, device: &Arc<NetworkDevice>, command: &ControlCommand) {
        info!("Device {} sent {:?}", device.guid(), command);
    }

    fn on_device_became_active(&self, device: &Arc<NetworkDevice>) {
        info!("Device {} is active", device.guid());
    }
}

/// Queues encoded packets for the gateway connection to write.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl QueueSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PacketSink for QueueSink {
    fn send(&self, packet: Vec<u8>) -> Result<(), ControllerError> {
        self.tx
            .send(packet)
            .map_err(|_| ControllerError::Transport("Outbound queue closed".into()))
    }
}
