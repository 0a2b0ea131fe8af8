pub mod error;
pub mod io;
pub mod slip;

pub use error::TransportError;
pub use io::{AsyncPacketTransport, SyncPacketTransport};
pub use slip::{SlipDecoder, encode_frame};

/// Default receive buffer capacity
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Longest unescaped frame accepted before giving up on it
pub const MAX_FRAME_BYTES: usize = 256;
