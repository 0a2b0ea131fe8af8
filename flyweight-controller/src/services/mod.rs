pub mod ack_service;
pub mod address_table;
pub mod association;
pub mod channel_survey;
pub mod dispatcher;
pub mod gateway;
pub mod listeners;

pub use ack_service::{AckService, AckState, PendingPacket};
pub use address_table::AddressTable;
pub use association::AssociationService;
pub use channel_survey::ChannelSurveyor;
pub use dispatcher::{AckIdentityMode, PacketDispatcher};
pub use gateway::GatewayServer;
pub use listeners::{
    AllowAll, AssociationPolicy, ChannelSelection, DeviceEventSink, LogEvents, PacketSink, QueueSink,
};
