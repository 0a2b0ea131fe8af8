//! SLIP framing (RFC 1055) used on the gateway link.

use alloc::vec::Vec;

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

/// Escapes `payload` and terminates it with END.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    for byte in payload {
        match *byte {
            END => frame.extend_from_slice(&[ESC, ESC_END]),
            ESC => frame.extend_from_slice(&[ESC, ESC_ESC]),
            other => frame.push(other),
        }
    }
    frame.push(END);
    frame
}

/// Incremental decoder; feed it bytes as they arrive from the link.
#[derive(Debug, Default)]
pub struct SlipDecoder {
    frame: Vec<u8>,
    escaped: bool,
}

impl SlipDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a complete frame when `byte` closes one. Empty frames are skipped.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.escaped {
            self.escaped = false;
            // Unknown escapes are kept as is
            self.frame.push(match byte {
                ESC_END => END,
                ESC_ESC => ESC,
                other => other,
            });
            return None;
        }

        match byte {
            END if self.frame.is_empty() => None,
            END => Some(core::mem::take(&mut self.frame)),
            ESC => {
                self.escaped = true;
                None
            }
            other => {
                self.frame.push(other);
                None
            }
        }
    }

    /// Bytes collected for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.frame.len()
    }

    pub fn reset(&mut self) {
        self.frame.clear();
        self.escaped = false;
    }
}
