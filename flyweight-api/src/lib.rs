#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod address;
pub mod bitfield;
pub mod command;
pub mod error;
pub mod packet;
pub mod transport;

pub use address::{NetAddress, NetGuid, NetworkId};
pub use command::{AssocCommand, Command, CommandGroup, ControlCommand, NetMgmtCommand};
pub use error::{CodecError, MalformedGuidError};
pub use packet::{Packet, PacketBody, PacketType};
