use core::fmt;

use alloc::string::String;

use crate::error::CodecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// I/O operation failed
    Io(String),
    /// Link closed by the peer
    Closed,
    /// Frame exceeds the receive limit before its END byte arrived
    FrameOverflow(usize),
    /// Frame arrived intact but did not decode
    Codec(CodecError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Closed => write!(f, "Link closed"),
            Self::FrameOverflow(size) => write!(f, "Frame overflow: {} bytes without END", size),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
        }
    }
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

pub type Result<T> = core::result::Result<T, TransportError>;
