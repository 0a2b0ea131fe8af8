//! MSB-first bit-field writer and reader shared by every packet and command.
//!
//! Fields on the radio link are sized in bits, not bytes: a 2-bit version is
//! followed by a 1-bit packet type, a 4-bit network id and so on. Multi-byte
//! integers are big-endian.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{CodecError, Result};

#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    buffer: Vec<u8>,
    /// Bits already used in the last byte of `buffer` (0 means byte aligned)
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes),
            bit_pos: 0,
        }
    }

    /// Writes the low `width` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, width: u8) {
        debug_assert!(width <= 32);
        for shift in (0..width).rev() {
            let bit = ((value >> shift) & 1) as u8;
            if self.bit_pos == 0 {
                self.buffer.push(0);
            }
            if let Some(last) = self.buffer.last_mut() {
                *last |= bit << (7 - self.bit_pos);
            }
            self.bit_pos = (self.bit_pos + 1) % 8;
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bits(value as u32, 8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bits(value as u32, 16);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value, 32);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_pos == 0 {
            self.buffer.extend_from_slice(bytes);
        } else {
            for byte in bytes {
                self.write_u8(*byte);
            }
        }
    }

    /// Length-prefixed string, truncated to 255 bytes.
    pub fn write_pstring(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u8::MAX as usize);
        self.write_u8(len as u8);
        self.write_bytes(&bytes[..len]);
    }

    /// Pads the current byte with zero bits.
    pub fn align(&mut self) {
        self.bit_pos = 0;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit offset into `data`
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    fn ensure(&self, needed_bits: usize) -> Result<()> {
        let available_bits = self.remaining_bits();
        if needed_bits > available_bits {
            return Err(CodecError::IncompleteFrame {
                needed_bits,
                available_bits,
            });
        }
        Ok(())
    }

    pub fn read_bits(&mut self, width: u8) -> Result<u32> {
        debug_assert!(width <= 32);
        self.ensure(width as usize)?;

        let mut value = 0u32;
        for _ in 0..width {
            let byte = self.data[self.pos / 8];
            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.pos += 1;
        }
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bits(32)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure(len * 8)?;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.read_u8()?);
        }
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N * 8)?;
        let mut bytes = [0u8; N];
        for byte in bytes.iter_mut() {
            *byte = self.read_u8()?;
        }
        Ok(bytes)
    }

    /// Reads a length-prefixed string. Non UTF-8 bytes are replaced.
    pub fn read_pstring(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Skips to the start of the next byte.
    pub fn align(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
    }

    /// Whole bytes left after the current (aligned) position.
    pub fn remaining_bytes(&self) -> usize {
        self.remaining_bits() / 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::vec;

    #[test]
    fn test_write_packs_msb_first() {
        let mut writer = BitWriter::new();
        writer.write_bits(0, 2);
        writer.write_bits(1, 1);
        writer.write_bits(0, 1);
        writer.write_bits(0x0F, 4);
        writer.write_u8(0xAB);
        assert_eq!(writer.finish(), vec![0x2F, 0xAB]);
    }

    #[test]
    fn test_partial_byte_is_zero_padded() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        assert_eq!(writer.len(), 1);
        assert_eq!(writer.finish(), vec![0b1010_0000]);
    }

    #[test]
    fn test_unaligned_bytes() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xA, 4);
        writer.write_bytes(&[0xBC, 0xDE]);
        writer.write_bits(0xF, 4);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0xAB, 0xCD, 0xEF]);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(4).unwrap(), 0xA);
        assert_eq!(reader.read_bytes(2).unwrap(), vec![0xBC, 0xDE]);
        assert_eq!(reader.read_bits(4).unwrap(), 0xF);
    }

    #[test]
    fn test_big_endian_integers() {
        let mut writer = BitWriter::new();
        writer.write_u16(0x1234);
        writer.write_u32(0xDEADBEEF);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF]);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.remaining_bytes(), 0);
    }

    #[test]
    fn test_pstring() {
        let mut writer = BitWriter::new();
        writer.write_pstring("TEST1");
        let bytes = writer.finish();
        assert_eq!(bytes, vec![5, b'T', b'E', b'S', b'T', b'1']);
        assert_eq!(BitReader::new(&bytes).read_pstring().unwrap(), "TEST1");
    }

    #[test]
    fn test_read_past_end_is_incomplete() {
        let data = [0xFFu8];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(6).unwrap(), 0x3F);
        assert_eq!(
            reader.read_u8(),
            Err(CodecError::IncompleteFrame {
                needed_bits: 8,
                available_bits: 2
            })
        );

        let mut reader = BitReader::new(&[3, b'a']);
        assert!(matches!(
            reader.read_pstring(),
            Err(CodecError::IncompleteFrame { .. })
        ));
    }

    #[test]
    fn test_align_skips_padding() {
        let data = [0b1000_0000, 0x42];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(1).unwrap(), 1);
        reader.align();
        assert_eq!(reader.read_u8().unwrap(), 0x42);
        reader.align();
        assert_eq!(reader.remaining_bytes(), 0);
    }
}
