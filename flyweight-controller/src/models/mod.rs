pub mod channel;
pub mod device;

pub use channel::{ChannelInfo, MAX_CHANNELS, MAX_CHANNEL_VALUE};
pub use device::{DeviceState, DeviceStatus, NetworkDevice};
