//! Commands carried inside standard packets.
//!
//! Every command starts with a 4-bit group, a 4-bit endpoint and an opcode
//! byte, followed by a payload whose layout belongs to the concrete command.

mod assoc;
mod control;
mod netmgmt;

use core::fmt;

pub use assoc::{AssocAck, AssocCheck, AssocCommand, AssocReq, AssocResp, AssociationStatus, SystemStatus};
pub use control::{ControlCommand, PosControllerInstruction};
pub use netmgmt::{NetCheck, NetCheckType, NetMgmtCommand};

use crate::bitfield::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandGroup {
    NetMgmt = 0,
    Assoc = 1,
    Control = 3,
}

impl CommandGroup {
    pub const BITS: u8 = 4;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NetMgmt),
            1 => Some(Self::Assoc),
            3 => Some(Self::Control),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NetMgmt => "NETMGMT",
            Self::Assoc => "ASSOC",
            Self::Control => "CONTROL",
        }
    }
}

/// Endpoint used by network management and association traffic
pub const MGMT_ENDPOINT: u8 = 0;
/// Endpoint used by control traffic
pub const PRIMARY_ENDPOINT: u8 = 1;
pub const ENDPOINT_BITS: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NetMgmt(NetMgmtCommand),
    Assoc(AssocCommand),
    Control(ControlCommand),
}

impl Command {
    pub fn group(&self) -> CommandGroup {
        match self {
            Self::NetMgmt(_) => CommandGroup::NetMgmt,
            Self::Assoc(_) => CommandGroup::Assoc,
            Self::Control(_) => CommandGroup::Control,
        }
    }

    pub fn endpoint(&self) -> u8 {
        match self {
            Self::Control(_) => PRIMARY_ENDPOINT,
            _ => MGMT_ENDPOINT,
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::NetMgmt(cmd) => cmd.opcode(),
            Self::Assoc(cmd) => cmd.opcode(),
            Self::Control(cmd) => cmd.opcode(),
        }
    }

    /// Whether the receiver must confirm delivery with an ACK packet.
    pub fn requires_ack(&self) -> bool {
        match self {
            Self::Control(cmd) => cmd.requires_ack(),
            _ => false,
        }
    }

    pub fn encode(&self, writer: &mut BitWriter) {
        writer.write_bits(self.group() as u32, CommandGroup::BITS);
        writer.write_bits(self.endpoint() as u32, ENDPOINT_BITS);
        writer.write_u8(self.opcode());

        match self {
            Self::NetMgmt(cmd) => cmd.encode_payload(writer),
            Self::Assoc(cmd) => cmd.encode_payload(writer),
            Self::Control(cmd) => cmd.encode_payload(writer),
        }
    }

    pub fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        let group = reader.read_bits(CommandGroup::BITS)? as u8;
        let _endpoint = reader.read_bits(ENDPOINT_BITS)?;
        let opcode = reader.read_u8()?;

        match CommandGroup::from_u8(group) {
            Some(CommandGroup::NetMgmt) => {
                NetMgmtCommand::decode_payload(opcode, reader).map(Self::NetMgmt)
            }
            Some(CommandGroup::Assoc) => AssocCommand::decode_payload(opcode, reader).map(Self::Assoc),
            Some(CommandGroup::Control) => {
                ControlCommand::decode_payload(opcode, reader).map(Self::Control)
            }
            None => Err(CodecError::UnknownCommand { group, opcode }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetMgmt(cmd) => write!(f, "{} {:?}", self.group().name(), cmd),
            Self::Assoc(cmd) => write!(f, "{} {:?}", self.group().name(), cmd),
            Self::Control(cmd) => write!(f, "{} {:?}", self.group().name(), cmd),
        }
    }
}

impl From<NetMgmtCommand> for Command {
    fn from(cmd: NetMgmtCommand) -> Self {
        Self::NetMgmt(cmd)
    }
}

impl From<AssocCommand> for Command {
    fn from(cmd: AssocCommand) -> Self {
        Self::Assoc(cmd)
    }
}

impl From<ControlCommand> for Command {
    fn from(cmd: ControlCommand) -> Self {
        Self::Control(cmd)
    }
}

/// Writes the fixed-width GUID text, right-aligned and zero padded to 8 characters.
pub(crate) fn write_guid(writer: &mut BitWriter, guid: &str) {
    let mut bytes = [b'0'; crate::NetGuid::HEX_CHARS];
    for (slot, byte) in bytes.iter_mut().rev().zip(guid.bytes().rev()) {
        *slot = byte;
    }
    writer.write_bytes(&bytes);
}

/// GUID text stays raw here; callers parse it so a bad GUID only drops one packet.
pub(crate) fn read_guid(reader: &mut BitReader<'_>) -> Result<alloc::string::String> {
    let bytes = reader.read_array::<{ crate::NetGuid::HEX_CHARS }>()?;
    Ok(alloc::string::String::from_utf8_lossy(&bytes).into_owned())
}
