use std::env;

use config::{Config, ConfigError, Environment, File};
use flyweight_api::{NetAddress, NetGuid, NetworkId};
use serde::{Deserialize, Serialize};

use crate::services::AckIdentityMode;
use crate::services::ack_service::MAX_ACK_ID;

/// Default bound of each per-destination pending ACK queue, one slot per ACK-ID
pub const ACK_QUEUE_SIZE: usize = MAX_ACK_ID as usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Controller {
    pub network_id: NetworkId,
    #[serde(default = "default_server_address")]
    pub server_address: NetAddress,
    /// Skip the channel survey and operate on this channel
    #[serde(default)]
    pub preferred_channel: Option<u8>,
    #[serde(default = "default_ack_queue_capacity")]
    pub ack_queue_capacity: usize,
    #[serde(default)]
    pub ack_identity: AckIdentityMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

/// A device known to this site, registered before it ever talks on the radio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub guid: NetGuid,
    #[serde(default)]
    pub sleep_seconds: u16,
    #[serde(default)]
    pub scanner_type: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub controller: Controller,
    pub gateway: Gateway,
    pub logger: Logger,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

fn default_server_address() -> NetAddress {
    NetAddress::GATEWAY
}

fn default_ack_queue_capacity() -> usize {
    ACK_QUEUE_SIZE
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("FLYWEIGHT").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}
