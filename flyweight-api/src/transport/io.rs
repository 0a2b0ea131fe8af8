use core::fmt::Debug;

use alloc::vec::Vec;

use embedded_io::{Read as SyncRead, Write as SyncWrite};
use embedded_io_async::{Read as AsyncRead, Write as AsyncWrite};

use super::error::TransportError;
use super::slip::{SlipDecoder, encode_frame};
use super::{DEFAULT_BUFFER_SIZE, MAX_FRAME_BYTES};
use crate::packet::Packet;

#[derive(Debug)]
pub struct AsyncPacketTransport<IO> {
    io: IO,
    rx_buffer: Vec<u8>,
    decoder: SlipDecoder,
    max_frame_bytes: usize,
}

#[derive(Debug)]
pub struct SyncPacketTransport<IO> {
    io: IO,
    rx_buffer: Vec<u8>,
    decoder: SlipDecoder,
    max_frame_bytes: usize,
}

macro_rules! impl_transport_common {
    ($transport:ident) => {
        impl<IO> $transport<IO> {
            pub fn new(io: IO) -> Self {
                Self {
                    io,
                    rx_buffer: Vec::with_capacity(DEFAULT_BUFFER_SIZE),
                    decoder: SlipDecoder::new(),
                    max_frame_bytes: MAX_FRAME_BYTES,
                }
            }

            pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
                self.max_frame_bytes = max_frame_bytes;
                self
            }

            pub fn inner(&self) -> &IO {
                &self.io
            }

            pub fn inner_mut(&mut self) -> &mut IO {
                &mut self.io
            }

            pub fn into_inner(self) -> IO {
                self.io
            }

            pub fn clear_rx_buffer(&mut self) {
                self.rx_buffer.clear();
                self.decoder.reset();
            }

            pub fn rx_buffer_len(&self) -> usize {
                self.rx_buffer.len()
            }

            /// Pulls the next complete frame out of bytes already read.
            fn next_buffered_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
                let mut consumed = 0;
                let mut frame = None;
                for byte in self.rx_buffer.iter() {
                    consumed += 1;
                    if let Some(complete) = self.decoder.push(*byte) {
                        frame = Some(complete);
                        break;
                    }
                    if self.decoder.pending_len() > self.max_frame_bytes {
                        break;
                    }
                }
                self.rx_buffer.drain(..consumed);

                let pending = self.decoder.pending_len();
                if frame.is_none() && pending > self.max_frame_bytes {
                    self.decoder.reset();
                    return Err(TransportError::FrameOverflow(pending));
                }
                Ok(frame)
            }
        }
    };
}

impl_transport_common!(AsyncPacketTransport);
impl_transport_common!(SyncPacketTransport);

impl<IO> AsyncPacketTransport<IO>
where
    IO: AsyncWrite,
    IO::Error: Debug,
{
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame(payload);
        self.io
            .write_all(&frame)
            .await
            .map_err(|e| TransportError::Io(alloc::format!("{:?}", e)))?;
        self.io
            .flush()
            .await
            .map_err(|e| TransportError::Io(alloc::format!("{:?}", e)))
    }

    pub async fn send_packet(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let bytes = packet.encode()?;
        self.send_frame(&bytes).await
    }
}

impl<IO> AsyncPacketTransport<IO>
where
    IO: AsyncRead,
    IO::Error: Debug,
{
    pub async fn receive_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            if let Some(frame) = self.next_buffered_frame()? {
                return Ok(frame);
            }

            let mut temp_buf = [0u8; 256];
            let n = self
                .io
                .read(&mut temp_buf)
                .await
                .map_err(|e| TransportError::Io(alloc::format!("{:?}", e)))?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.rx_buffer.extend_from_slice(&temp_buf[..n]);
        }
    }

    /// Reads one frame and decodes it. A frame that fails to decode is still consumed.
    pub async fn receive_packet(&mut self) -> Result<Packet, TransportError> {
        let frame = self.receive_frame().await?;
        Ok(Packet::decode(&frame)?)
    }
}

impl<IO> SyncPacketTransport<IO>
where
    IO: SyncWrite,
    IO::Error: Debug,
{
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame(payload);
        self.io
            .write_all(&frame)
            .map_err(|e| TransportError::Io(alloc::format!("{:?}", e)))?;
        self.io
            .flush()
            .map_err(|e| TransportError::Io(alloc::format!("{:?}", e)))
    }

    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let bytes = packet.encode()?;
        self.send_frame(&bytes)
    }
}

impl<IO> SyncPacketTransport<IO>
where
    IO: SyncRead,
    IO::Error: Debug,
{
    pub fn receive_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            if let Some(frame) = self.next_buffered_frame()? {
                return Ok(frame);
            }

            let mut temp_buf = [0u8; 256];
            let n = self
                .io
                .read(&mut temp_buf)
                .map_err(|e| TransportError::Io(alloc::format!("{:?}", e)))?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.rx_buffer.extend_from_slice(&temp_buf[..n]);
        }
    }

    pub fn receive_packet(&mut self) -> Result<Packet, TransportError> {
        let frame = self.receive_frame()?;
        Ok(Packet::decode(&frame)?)
    }
}
