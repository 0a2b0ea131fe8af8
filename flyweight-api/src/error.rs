use core::fmt;

use alloc::string::String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before the field was complete
    IncompleteFrame { needed_bits: usize, available_bits: usize },
    /// Command group or opcode is not recognized
    UnknownCommand { group: u8, opcode: u8 },
    /// Packet header carries a protocol version we do not speak
    UnsupportedVersion(u8),
    /// Encoded packet does not fit in a radio frame
    FrameTooLarge(usize),
    /// Value does not fit in the bit width of its field
    FieldOverflow { field: &'static str, value: u32 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteFrame {
                needed_bits,
                available_bits,
            } => write!(
                f,
                "Incomplete frame: needed {} bits, {} available",
                needed_bits, available_bits
            ),
            Self::UnknownCommand { group, opcode } => {
                write!(f, "Unknown command: group {} opcode {}", group, opcode)
            }
            Self::UnsupportedVersion(v) => write!(f, "Unsupported packet version: {}", v),
            Self::FrameTooLarge(size) => write!(f, "Frame too large: {} bytes", size),
            Self::FieldOverflow { field, value } => {
                write!(f, "Value {} overflows field {}", value, field)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// Raised when GUID text is not 8 hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedGuidError(pub String);

impl fmt::Display for MalformedGuidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed GUID: {:?}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MalformedGuidError {}

pub type Result<T> = core::result::Result<T, CodecError>;
