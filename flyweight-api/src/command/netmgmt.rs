use alloc::string::String;

use crate::address::NetworkId;
use crate::bitfield::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

use super::{CommandGroup, read_guid, write_guid};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetCheckType {
    Request = 1,
    Response = 2,
}

/// Channel probe used while surveying for a quiet channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetCheck {
    pub check_type: NetCheckType,
    /// Network the probe is scoped to; broadcast means every network
    pub network_id: NetworkId,
    pub guid: String,
    pub channel: u8,
    pub channel_energy: u8,
    pub link_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetMgmtCommand {
    /// Tells the gateway which network and channel to operate on
    Setup { network_id: NetworkId, channel: u8 },
    Check(NetCheck),
    IntfTest { number: u8 },
}

impl NetMgmtCommand {
    pub const SETUP: u8 = 1;
    pub const CHECK: u8 = 2;
    pub const INTFTEST: u8 = 3;

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Setup { .. } => Self::SETUP,
            Self::Check(_) => Self::CHECK,
            Self::IntfTest { .. } => Self::INTFTEST,
        }
    }

    pub(crate) fn encode_payload(&self, writer: &mut BitWriter) {
        match self {
            Self::Setup {
                network_id,
                channel,
            } => {
                write_network_id(writer, *network_id);
                writer.write_u8(*channel);
            }
            Self::Check(check) => {
                writer.write_u8(check.check_type as u8);
                write_network_id(writer, check.network_id);
                write_guid(writer, &check.guid);
                writer.write_u8(check.channel);
                writer.write_u8(check.channel_energy);
                writer.write_u8(check.link_quality);
            }
            Self::IntfTest { number } => writer.write_u8(*number),
        }
    }

    pub(crate) fn decode_payload(opcode: u8, reader: &mut BitReader<'_>) -> Result<Self> {
        match opcode {
            Self::SETUP => Ok(Self::Setup {
                network_id: read_network_id(reader)?,
                channel: reader.read_u8()?,
            }),
            Self::CHECK => {
                let check_type = match reader.read_u8()? {
                    1 => NetCheckType::Request,
                    2 => NetCheckType::Response,
                    _ => {
                        return Err(CodecError::UnknownCommand {
                            group: CommandGroup::NetMgmt as u8,
                            opcode,
                        });
                    }
                };
                Ok(Self::Check(NetCheck {
                    check_type,
                    network_id: read_network_id(reader)?,
                    guid: read_guid(reader)?,
                    channel: reader.read_u8()?,
                    channel_energy: reader.read_u8()?,
                    link_quality: reader.read_u8()?,
                }))
            }
            Self::INTFTEST => Ok(Self::IntfTest {
                number: reader.read_u8()?,
            }),
            _ => Err(CodecError::UnknownCommand {
                group: CommandGroup::NetMgmt as u8,
                opcode,
            }),
        }
    }
}

// Network id nibble followed by a zero nibble so later fields stay byte aligned.
fn write_network_id(writer: &mut BitWriter, network_id: NetworkId) {
    writer.write_bits(network_id.value() as u32, NetworkId::BITS);
    writer.align();
}

fn read_network_id(reader: &mut BitReader<'_>) -> Result<NetworkId> {
    let value = reader.read_bits(NetworkId::BITS)? as u8;
    reader.align();
    NetworkId::new(value)
}
