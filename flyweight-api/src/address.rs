use core::fmt;
use core::str::FromStr;

use alloc::format;
use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, MalformedGuidError};

/// Logical radio network sharing a channel, 4 bits wide on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct NetworkId(u8);

impl NetworkId {
    pub const BITS: u8 = 4;
    /// Addressed to every network
    pub const BROADCAST: Self = Self(0x0F);
    pub const DEFAULT: Self = Self(0x01);
    pub const ZERO: Self = Self(0x00);

    pub fn new(value: u8) -> Result<Self, CodecError> {
        if value > Self::BROADCAST.0 {
            return Err(CodecError::FieldOverflow {
                field: "network_id",
                value: value as u32,
            });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl Default for NetworkId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for NetworkId {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NetworkId> for u8 {
    fn from(id: NetworkId) -> Self {
        id.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short address of the controller or a device within one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct NetAddress(u8);

impl NetAddress {
    pub const BITS: u8 = 8;
    /// The controller itself
    pub const GATEWAY: Self = Self(0x00);
    pub const BROADCAST: Self = Self(0xFF);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// True for addresses that may be handed to a device.
    pub fn is_assignable(&self) -> bool {
        *self != Self::GATEWAY && *self != Self::BROADCAST
    }
}

impl From<u8> for NetAddress {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<NetAddress> for u8 {
    fn from(address: NetAddress) -> Self {
        address.0
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vendor-burned device identifier. Carried on the wire as 8 ASCII hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetGuid(u32);

impl NetGuid {
    /// Number of hex characters in the wire form
    pub const HEX_CHARS: usize = 8;
    /// The controller's private identity marker on net-check traffic
    pub const PRIVATE: Self = Self(0);
    pub const PRIVATE_TEXT: &'static str = "00000000";

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Parses `"0000abcd"` or `"0x0000abcd"`, case-insensitive.
    pub fn parse(text: &str) -> Result<Self, MalformedGuidError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);

        if digits.len() != Self::HEX_CHARS || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MalformedGuidError(text.into()));
        }

        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| MalformedGuidError(text.into()))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Seed for address allocation.
    pub fn low_byte(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Uppercase wire form without prefix.
    pub fn to_hex(&self) -> String {
        format!("{:08X}", self.0)
    }
}

impl FromStr for NetGuid {
    type Err = MalformedGuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NetGuid {
    type Error = MalformedGuidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NetGuid> for String {
    fn from(guid: NetGuid) -> Self {
        guid.to_hex()
    }
}

impl fmt::Display for NetGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
