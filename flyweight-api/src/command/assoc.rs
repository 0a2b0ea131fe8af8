use core::fmt;

use alloc::string::String;

use crate::address::{NetAddress, NetworkId};
use crate::bitfield::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

use super::{CommandGroup, read_guid, write_guid};

/// Reset-cause bits reported by a device when it asks to associate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStatus(u8);

impl SystemStatus {
    const LOW_VOLTAGE: u8 = 0x02;
    const ILLEGAL_CLOCK_GATE: u8 = 0x04;
    const ILLEGAL_OPCODE: u8 = 0x10;
    const WATCHDOG: u8 = 0x20;
    const RESET_PIN: u8 = 0x40;
    const POWER_ON: u8 = 0x80;

    const NAMES: &'static [(u8, &'static str)] = &[
        (Self::LOW_VOLTAGE, "low voltage detect"),
        (Self::ILLEGAL_CLOCK_GATE, "illegal clock gate"),
        (Self::ILLEGAL_OPCODE, "illegal opcode"),
        (Self::WATCHDOG, "watchdog"),
        (Self::RESET_PIN, "reset pin"),
        (Self::POWER_ON, "power on"),
    ];

    pub fn from_u8(value: u8) -> Self {
        Self(value)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn is_power_on_reset(&self) -> bool {
        (self.0 & Self::POWER_ON) != 0
    }

    /// Human readable reset causes that are set.
    pub fn causes(&self) -> impl Iterator<Item = &'static str> {
        let bits = self.0;
        Self::NAMES
            .iter()
            .filter(move |(bit, _)| (bits & bit) != 0)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cause in self.causes() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(cause)?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssocReq {
    pub guid: String,
    pub hardware_version: [u8; 4],
    pub firmware_version: [u8; 4],
    pub radio_protocol_version: u8,
    pub system_status: SystemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocResp {
    pub guid: String,
    pub address: NetAddress,
    pub network_id: NetworkId,
    pub sleep_seconds: u16,
    pub scanner_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocCheck {
    pub guid: String,
    pub battery_level: u8,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationStatus {
    Associated = 0,
    NotAssociated = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocAck {
    pub guid: String,
    pub status: AssociationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssocCommand {
    Req(AssocReq),
    Resp(AssocResp),
    Check(AssocCheck),
    Ack(AssocAck),
}

impl AssocCommand {
    pub const REQ: u8 = 1;
    pub const RESP: u8 = 2;
    pub const CHECK: u8 = 3;
    pub const ACK: u8 = 4;

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Req(_) => Self::REQ,
            Self::Resp(_) => Self::RESP,
            Self::Check(_) => Self::CHECK,
            Self::Ack(_) => Self::ACK,
        }
    }

    /// GUID text as carried on the wire, not yet validated.
    pub fn guid(&self) -> &str {
        match self {
            Self::Req(cmd) => &cmd.guid,
            Self::Resp(cmd) => &cmd.guid,
            Self::Check(cmd) => &cmd.guid,
            Self::Ack(cmd) => &cmd.guid,
        }
    }

    pub(crate) fn encode_payload(&self, writer: &mut BitWriter) {
        write_guid(writer, self.guid());

        match self {
            Self::Req(req) => {
                writer.write_bytes(&req.hardware_version);
                writer.write_bytes(&req.firmware_version);
                writer.write_u8(req.radio_protocol_version);
                writer.write_u8(req.system_status.as_u8());
            }
            Self::Resp(resp) => {
                writer.write_bits(resp.address.value() as u32, NetAddress::BITS);
                // Network spacing nibble is always zero
                writer.write_bits(0, NetworkId::BITS);
                writer.write_bits(resp.network_id.value() as u32, NetworkId::BITS);
                writer.write_u16(resp.sleep_seconds);
                writer.write_u8(resp.scanner_type);
            }
            Self::Check(check) => writer.write_u8(check.battery_level),
            Self::Ack(ack) => writer.write_u8(ack.status as u8),
        }
    }

    pub(crate) fn decode_payload(opcode: u8, reader: &mut BitReader<'_>) -> Result<Self> {
        if !(Self::REQ..=Self::ACK).contains(&opcode) {
            return Err(CodecError::UnknownCommand {
                group: CommandGroup::Assoc as u8,
                opcode,
            });
        }

        let guid = read_guid(reader)?;

        match opcode {
            Self::REQ => {
                // Older firmware stops after the GUID or the versions
                let mut req = AssocReq {
                    guid,
                    ..Default::default()
                };
                if reader.remaining_bytes() >= 4 {
                    req.hardware_version = reader.read_array()?;
                }
                if reader.remaining_bytes() >= 4 {
                    req.firmware_version = reader.read_array()?;
                }
                if reader.remaining_bytes() >= 1 {
                    req.radio_protocol_version = reader.read_u8()?;
                }
                if reader.remaining_bytes() >= 1 {
                    req.system_status = SystemStatus::from_u8(reader.read_u8()?);
                }
                Ok(Self::Req(req))
            }
            Self::RESP => {
                let address = NetAddress::new(reader.read_bits(NetAddress::BITS)? as u8);
                let _spacing = reader.read_bits(NetworkId::BITS)?;
                let network_id = NetworkId::new(reader.read_bits(NetworkId::BITS)? as u8)?;
                Ok(Self::Resp(AssocResp {
                    guid,
                    address,
                    network_id,
                    sleep_seconds: reader.read_u16()?,
                    scanner_type: reader.read_u8()?,
                }))
            }
            Self::CHECK => Ok(Self::Check(AssocCheck {
                guid,
                battery_level: reader.read_u8()?,
            })),
            _ => {
                let status = match reader.read_u8()? {
                    0 => AssociationStatus::Associated,
                    _ => AssociationStatus::NotAssociated,
                };
                Ok(Self::Ack(AssocAck { guid, status }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::string::ToString;
    use alloc::vec::Vec;

    fn encode(command: &AssocCommand) -> Vec<u8> {
        let mut writer = BitWriter::new();
        command.encode_payload(&mut writer);
        writer.finish()
    }

    #[test]
    fn test_short_request_keeps_defaults() {
        let bytes = b"000007FE";
        let decoded =
            AssocCommand::decode_payload(AssocCommand::REQ, &mut BitReader::new(bytes)).unwrap();
        assert_eq!(
            decoded,
            AssocCommand::Req(AssocReq {
                guid: "000007FE".into(),
                ..Default::default()
            })
        );

        let mut bytes = b"000007FE".to_vec();
        bytes.extend_from_slice(&[1, 0, 0, 0, 2, 1, 0, 0]);
        let decoded =
            AssocCommand::decode_payload(AssocCommand::REQ, &mut BitReader::new(&bytes)).unwrap();
        let AssocCommand::Req(req) = decoded else {
            panic!("expected request");
        };
        assert_eq!(req.hardware_version, [1, 0, 0, 0]);
        assert_eq!(req.firmware_version, [2, 1, 0, 0]);
        assert_eq!(req.radio_protocol_version, 0);
    }

    #[test]
    fn test_full_request() {
        let command = AssocCommand::Req(AssocReq {
            guid: "0000ABCD".into(),
            hardware_version: [1, 2, 3, 4],
            firmware_version: [5, 6, 7, 8],
            radio_protocol_version: 1,
            system_status: SystemStatus::from_u8(0x82),
        });
        let bytes = encode(&command);
        assert_eq!(bytes.len(), 8 + 4 + 4 + 1 + 1);
        assert_eq!(
            AssocCommand::decode_payload(AssocCommand::REQ, &mut BitReader::new(&bytes)).unwrap(),
            command
        );
    }

    #[test]
    fn test_response_layout() {
        let command = AssocCommand::Resp(AssocResp {
            guid: "00000701".into(),
            address: NetAddress::new(1),
            network_id: NetworkId::new(3).unwrap(),
            sleep_seconds: 300,
            scanner_type: 2,
        });
        let bytes = encode(&command);
        assert_eq!(&bytes[8..], &[1, 0x03, 0x01, 0x2C, 2]);
        assert_eq!(
            AssocCommand::decode_payload(AssocCommand::RESP, &mut BitReader::new(&bytes)).unwrap(),
            command
        );
    }

    #[test]
    fn test_ack_status_byte() {
        let command = AssocCommand::Ack(AssocAck {
            guid: "00000701".into(),
            status: AssociationStatus::NotAssociated,
        });
        assert_eq!(encode(&command)[8], 1);
    }

    #[test]
    fn test_truncated_check() {
        assert!(matches!(
            AssocCommand::decode_payload(AssocCommand::CHECK, &mut BitReader::new(b"0000")),
            Err(CodecError::IncompleteFrame { .. })
        ));
    }

    #[test]
    fn test_system_status_causes() {
        let status = SystemStatus::from_u8(0x82);
        assert!(status.is_power_on_reset());
        assert_eq!(status.to_string(), "low voltage detect, power on");
        assert_eq!(SystemStatus::default().to_string(), "none");
    }
}
