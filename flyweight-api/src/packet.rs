use core::fmt;

use alloc::vec::Vec;

use crate::address::{NetAddress, NetworkId};
use crate::bitfield::{BitReader, BitWriter};
use crate::command::Command;
use crate::error::{CodecError, Result};

/// Only header version spoken on the radio link
pub const PACKET_VERSION: u8 = 0;
pub const VERSION_BITS: u8 = 2;
pub const PACKET_TYPE_BITS: u8 = 1;
pub const RESERVED_BITS: u8 = 1;
/// Version, type, reserved, network, source, destination, ACK-ID
pub const HEADER_BYTES: usize = 4;
/// Radio frame is 125 bytes, two of which belong to the MAC
pub const MAX_PACKET_BYTES: usize = 123;
pub const EMPTY_ACK_ID: u8 = 0;
pub const ACK_DATA_BYTES: usize = 8;

pub type AckData = [u8; ACK_DATA_BYTES];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Standard = 0,
    Ack = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    Command(Command),
    /// Confirmation of an earlier command; the data is device specific
    Ack(AckData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub network_id: NetworkId,
    pub src: NetAddress,
    pub dst: NetAddress,
    pub ack_id: u8,
    pub body: PacketBody,
}

impl Packet {
    pub fn new(
        command: impl Into<Command>,
        network_id: NetworkId,
        src: NetAddress,
        dst: NetAddress,
    ) -> Self {
        Self {
            network_id,
            src,
            dst,
            ack_id: EMPTY_ACK_ID,
            body: PacketBody::Command(command.into()),
        }
    }

    pub fn ack(ack_id: u8, data: AckData, network_id: NetworkId, src: NetAddress, dst: NetAddress) -> Self {
        Self {
            network_id,
            src,
            dst,
            ack_id,
            body: PacketBody::Ack(data),
        }
    }

    pub fn with_ack_id(mut self, ack_id: u8) -> Self {
        self.ack_id = ack_id;
        self
    }

    pub fn packet_type(&self) -> PacketType {
        match self.body {
            PacketBody::Command(_) => PacketType::Standard,
            PacketBody::Ack(_) => PacketType::Ack,
        }
    }

    pub fn command(&self) -> Option<&Command> {
        match &self.body {
            PacketBody::Command(command) => Some(command),
            PacketBody::Ack(_) => None,
        }
    }

    pub fn has_ack_id(&self) -> bool {
        self.ack_id != EMPTY_ACK_ID
    }

    /// Broadcast on either axis; such packets can never be acknowledged.
    pub fn is_broadcast(&self) -> bool {
        self.network_id.is_broadcast() || self.dst.is_broadcast()
    }

    /// Encodes the packet, refusing anything that would not fit a radio frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = BitWriter::with_capacity(MAX_PACKET_BYTES);

        writer.write_bits(PACKET_VERSION as u32, VERSION_BITS);
        writer.write_bits(self.packet_type() as u32, PACKET_TYPE_BITS);
        writer.write_bits(0, RESERVED_BITS);
        writer.write_bits(self.network_id.value() as u32, NetworkId::BITS);
        writer.write_bits(self.src.value() as u32, NetAddress::BITS);
        writer.write_bits(self.dst.value() as u32, NetAddress::BITS);
        writer.write_u8(self.ack_id);

        match &self.body {
            PacketBody::Command(command) => command.encode(&mut writer),
            PacketBody::Ack(data) => {
                writer.write_u8(0);
                writer.write_bytes(data);
            }
        }

        let bytes = writer.finish();
        if bytes.len() > MAX_PACKET_BYTES {
            return Err(CodecError::FrameTooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(data);

        let version = reader.read_bits(VERSION_BITS)? as u8;
        if version != PACKET_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let packet_type = reader.read_bits(PACKET_TYPE_BITS)?;
        let _reserved = reader.read_bits(RESERVED_BITS)?;
        let network_id = NetworkId::new(reader.read_bits(NetworkId::BITS)? as u8)?;
        let src = NetAddress::new(reader.read_bits(NetAddress::BITS)? as u8);
        let dst = NetAddress::new(reader.read_bits(NetAddress::BITS)? as u8);
        let ack_id = reader.read_u8()?;

        let body = if packet_type == PacketType::Standard as u32 {
            PacketBody::Command(Command::decode(&mut reader)?)
        } else {
            let _command = reader.read_u8()?;
            PacketBody::Ack(reader.read_array()?)
        };

        Ok(Self {
            network_id,
            src,
            dst,
            ack_id,
            body,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net:{} src:{} dst:{}", self.network_id, self.src, self.dst)?;
        if self.has_ack_id() {
            write!(f, " ackid:{}", self.ack_id)?;
        }
        match &self.body {
            PacketBody::Command(command) => write!(f, " command:{}", command),
            PacketBody::Ack(data) => write!(f, " ack:{:02X?}", data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::string::{String, ToString};
    use alloc::vec;

    use crate::command::{AssocCheck, AssocCommand, ControlCommand};

    fn display_message() -> Command {
        Command::Control(ControlCommand::Message {
            line1: "TEST1".into(),
            line2: "TEST2".into(),
            line3: "TEST3".into(),
            line4: "TEST4".into(),
        })
    }

    #[test]
    fn test_decode_display_message_frame() {
        let mut frame = vec![0x01, 0x00, 0x01, 0x00, 0x31, 0x01];
        for line in ["TEST1", "TEST2", "TEST3", "TEST4"] {
            frame.push(5);
            frame.extend_from_slice(line.as_bytes());
        }

        let packet = Packet::decode(&frame).unwrap();
        assert_eq!(packet.network_id, NetworkId::DEFAULT);
        assert_eq!(packet.src, NetAddress::GATEWAY);
        assert_eq!(packet.dst, NetAddress::new(1));
        assert_eq!(packet.packet_type(), PacketType::Standard);
        assert!(!packet.has_ack_id());
        assert_eq!(packet.command(), Some(&display_message()));

        assert_eq!(packet.encode().unwrap(), frame);
    }

    #[test]
    fn test_ack_packet() {
        let packet = Packet::ack(
            42,
            [1, 2, 3, 4, 5, 6, 7, 8],
            NetworkId::DEFAULT,
            NetAddress::new(5),
            NetAddress::GATEWAY,
        );
        let bytes = packet.encode().unwrap();
        assert_eq!(&bytes[..5], &[0x21, 5, 0, 42, 0]);
        assert_eq!(bytes.len(), HEADER_BYTES + 1 + ACK_DATA_BYTES);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_truncated_frames_are_incomplete() {
        let packet = Packet::new(
            AssocCommand::Check(AssocCheck {
                guid: "00000701".into(),
                battery_level: 90,
            }),
            NetworkId::DEFAULT,
            NetAddress::new(1),
            NetAddress::GATEWAY,
        );
        let bytes = packet.encode().unwrap();

        for len in [0, 2, HEADER_BYTES, bytes.len() - 1] {
            assert!(
                matches!(
                    Packet::decode(&bytes[..len]),
                    Err(CodecError::IncompleteFrame { .. })
                ),
                "length {len}"
            );
        }

        let ack = [0x21, 5, 0, 42, 0, 1, 2];
        assert!(matches!(
            Packet::decode(&ack),
            Err(CodecError::IncompleteFrame { .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        assert_eq!(
            Packet::decode(&[0x41, 0, 1, 0, 0x31, 0x01]),
            Err(CodecError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn test_oversized_packet() {
        let packet = Packet::new(
            ControlCommand::Message {
                line1: "X".repeat(60),
                line2: "Y".repeat(60),
                line3: String::new(),
                line4: String::new(),
            },
            NetworkId::DEFAULT,
            NetAddress::GATEWAY,
            NetAddress::new(3),
        );
        assert!(matches!(packet.encode(), Err(CodecError::FrameTooLarge(_))));
    }

    #[test]
    fn test_broadcast_and_display() {
        let packet = Packet::new(display_message(), NetworkId::BROADCAST, NetAddress::GATEWAY, NetAddress::new(4));
        assert!(packet.is_broadcast());

        let packet = Packet::new(display_message(), NetworkId::DEFAULT, NetAddress::GATEWAY, NetAddress::new(4))
            .with_ack_id(7);
        assert!(!packet.is_broadcast());
        assert!(packet.to_string().starts_with("net:1 src:0 dst:4 ackid:7 command:CONTROL"));
    }
}
