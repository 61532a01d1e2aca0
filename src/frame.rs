//! Frame reader: the only code that touches the raw byte transport.
//!
//! A frame is read in five steps: packet id (1 byte), counter (1 byte),
//! payload length (2 bytes), device timestamp (4 bytes), then the remaining
//! `payload_length − 4` payload bytes. Any step that hits end-of-stream
//! fails with [`ExploreError::TruncatedRead`]; no retry happens here.

use std::io::{ErrorKind, Read};

use crate::error::{ExploreError, Result};
use crate::protocol::{HEADER_LEN, TIMESTAMP_LEN};

/// One undecoded frame as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: u8,
    /// Advisory sequence counter; wraps and is never validated.
    pub counter: u8,
    /// Declared length, including the 4 timestamp bytes.
    pub payload_length: u16,
    /// Device clock in 0.1 ms ticks.
    pub device_timestamp: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame, deriving `payload_length` from the payload.
    ///
    /// Payloads longer than the 16-bit length field allows produce a frame
    /// whose declared length saturates; keep them under 65 531 bytes.
    pub fn new(packet_type: u8, counter: u8, device_timestamp: u32, payload: Vec<u8>) -> Self {
        let payload_length =
            u16::try_from(payload.len() + TIMESTAMP_LEN as usize).unwrap_or(u16::MAX);
        Self {
            packet_type,
            counter,
            payload_length,
            device_timestamp,
            payload,
        }
    }

    /// Serialise to the on-wire byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(self.packet_type);
        out.push(self.counter);
        out.extend_from_slice(&self.payload_length.to_le_bytes());
        out.extend_from_slice(&self.device_timestamp.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Pulls [`Frame`]s from a blocking byte source.
///
/// The source can be swapped with [`FrameReader::rebind`] after a transport
/// failure; the reader itself holds no state between frames.
pub struct FrameReader<R> {
    source: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Read exactly one frame.
    ///
    /// # Errors
    /// * [`ExploreError::TruncatedRead`] if the source ended mid-read.
    /// * [`ExploreError::Transport`] if the source reported an I/O error.
    /// * [`ExploreError::InvalidFrameLength`] if the declared length cannot
    ///   hold the timestamp. The header has been consumed; the next call
    ///   reads the following bytes as a fresh header.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let [packet_type] = self.read_array::<1>()?;
        let [counter] = self.read_array::<1>()?;
        let payload_length = u16::from_le_bytes(self.read_array::<2>()?);
        let device_timestamp = u32::from_le_bytes(self.read_array::<4>()?);

        if payload_length < TIMESTAMP_LEN {
            return Err(ExploreError::InvalidFrameLength {
                payload_length,
                minimum: TIMESTAMP_LEN,
            });
        }

        let mut payload = vec![0u8; (payload_length - TIMESTAMP_LEN) as usize];
        self.fill(&mut payload)?;

        Ok(Frame {
            packet_type,
            counter,
            payload_length,
            device_timestamp,
            payload,
        })
    }

    /// Replace the byte source, returning the previous one.
    pub fn rebind(&mut self, source: R) -> R {
        std::mem::replace(&mut self.source, source)
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` completely, looping over short reads.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut received = 0;
        while received < buf.len() {
            match self.source.read(&mut buf[received..]) {
                Ok(0) => {
                    return Err(ExploreError::TruncatedRead {
                        expected: buf.len(),
                        received,
                    })
                }
                Ok(n) => received += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ExploreError::Transport(e)),
            }
        }
        Ok(())
    }
}
