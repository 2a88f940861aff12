//! Stream framing: a big-endian `u16` length prefix in front of every message.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::TransportError;

/// Size of the length prefix.
pub const PREFIX_LEN: usize = 2;

/// Largest payload a frame can carry.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Prefixes `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| TransportError::FrameTooLarge(payload.len()))?;
    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Reassembles length-prefixed frames from arbitrarily split stream reads.
///
/// Bytes are accumulated across calls to [`FrameDecoder::extend`]. A frame is only released
/// once its prefix and the full payload it announces have arrived.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes read from the stream.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes buffered that are not part of a released frame yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Releases the next complete frame, or returns `None` if more data is needed.
    ///
    /// Partial data stays buffered for the next call.
    pub fn decode(&mut self) -> Option<Bytes> {
        let prefix = self.buf.get(..PREFIX_LEN)?;
        let len = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
        if self.buf.len() < PREFIX_LEN + len {
            return None;
        }

        self.buf.advance(PREFIX_LEN);
        Some(self.buf.split_to(len).freeze())
    }

    /// Like [`FrameDecoder::decode`], for use once the stream has ended.
    ///
    /// Runs the same length check. If no complete frame is left but bytes remain, the stream was
    /// cut off inside a frame and [`TransportError::ClosedMidFrame`] is returned; the leftover
    /// bytes are discarded.
    pub fn decode_last(&mut self) -> Result<Option<Bytes>, TransportError> {
        if let Some(frame) = self.decode() {
            return Ok(Some(frame));
        }
        if self.buf.is_empty() {
            Ok(None)
        } else {
            let buffered = self.buf.len();
            self.buf.clear();
            Err(TransportError::ClosedMidFrame { buffered })
        }
    }
}
