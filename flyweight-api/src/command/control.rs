use alloc::string::String;
use alloc::vec::Vec;

use crate::bitfield::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

use super::CommandGroup;

/// One lit position on a position controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosControllerInstruction {
    pub position: u8,
    pub quantity: u8,
    pub min_quantity: u8,
    pub max_quantity: u8,
    pub frequency: u8,
    pub brightness: u8,
}

/// Application commands. The controller only routes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Scan {
        value: String,
    },
    Message {
        line1: String,
        line2: String,
        line3: String,
        line4: String,
    },
    Button {
        position: u8,
        value: u8,
    },
    SetPosController(Vec<PosControllerInstruction>),
    ClearPosController {
        position: u8,
    },
}

impl ControlCommand {
    pub const SCAN: u8 = 0;
    pub const MESSAGE: u8 = 1;
    pub const BUTTON: u8 = 2;
    pub const SET_POSCONTROLLER: u8 = 3;
    pub const CLEAR_POSCONTROLLER: u8 = 4;

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Scan { .. } => Self::SCAN,
            Self::Message { .. } => Self::MESSAGE,
            Self::Button { .. } => Self::BUTTON,
            Self::SetPosController(_) => Self::SET_POSCONTROLLER,
            Self::ClearPosController { .. } => Self::CLEAR_POSCONTROLLER,
        }
    }

    /// Commands sent to a device that must be confirmed.
    pub fn requires_ack(&self) -> bool {
        matches!(
            self,
            Self::Message { .. } | Self::SetPosController(_) | Self::ClearPosController { .. }
        )
    }

    pub(crate) fn encode_payload(&self, writer: &mut BitWriter) {
        match self {
            Self::Scan { value } => writer.write_pstring(value),
            Self::Message {
                line1,
                line2,
                line3,
                line4,
            } => {
                for line in [line1, line2, line3, line4] {
                    writer.write_pstring(line);
                }
            }
            Self::Button { position, value } => {
                writer.write_u8(*position);
                writer.write_u8(*value);
            }
            Self::SetPosController(instructions) => {
                let count = instructions.len().min(u8::MAX as usize);
                writer.write_u8(count as u8);
                for instruction in &instructions[..count] {
                    writer.write_bytes(&[
                        instruction.position,
                        instruction.quantity,
                        instruction.min_quantity,
                        instruction.max_quantity,
                        instruction.frequency,
                        instruction.brightness,
                    ]);
                }
            }
            Self::ClearPosController { position } => writer.write_u8(*position),
        }
    }

    pub(crate) fn decode_payload(opcode: u8, reader: &mut BitReader<'_>) -> Result<Self> {
        match opcode {
            Self::SCAN => Ok(Self::Scan {
                value: reader.read_pstring()?,
            }),
            Self::MESSAGE => Ok(Self::Message {
                line1: reader.read_pstring()?,
                line2: reader.read_pstring()?,
                line3: reader.read_pstring()?,
                line4: reader.read_pstring()?,
            }),
            Self::BUTTON => Ok(Self::Button {
                position: reader.read_u8()?,
                value: reader.read_u8()?,
            }),
            Self::SET_POSCONTROLLER => {
                let count = reader.read_u8()? as usize;
                let mut instructions = Vec::with_capacity(count);
                for _ in 0..count {
                    let [position, quantity, min_quantity, max_quantity, frequency, brightness] =
                        reader.read_array::<6>()?;
                    instructions.push(PosControllerInstruction {
                        position,
                        quantity,
                        min_quantity,
                        max_quantity,
                        frequency,
                        brightness,
                    });
                }
                Ok(Self::SetPosController(instructions))
            }
            Self::CLEAR_POSCONTROLLER => Ok(Self::ClearPosController {
                position: reader.read_u8()?,
            }),
            _ => Err(CodecError::UnknownCommand {
                group: CommandGroup::Control as u8,
                opcode,
            }),
        }
    }
}
