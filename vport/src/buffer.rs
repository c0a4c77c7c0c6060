//! Outbound message buffers with in-place header stamping.

use vport_proto::{HEADER_SIZE, MAX_MESSAGE_LENGTH, Message, MessageHeader, MessageType, ProtoError};

use crate::error::Result;

/// An owned outbound frame: payload plus reserved header space.
///
/// The allocation carries the header region immediately in front of
/// the payload, so stamping the header at send time needs no second
/// allocation or copy. The payload size is written at allocation; the
/// type is stamped when the buffer is handed to a send primitive.
/// Dropping the buffer releases it — every completion path (success,
/// failure, cancellation) frees it exactly once.
#[derive(Debug)]
pub struct MsgBuffer {
    buf: Vec<u8>,
}

impl MsgBuffer {
    /// Allocates a buffer for `payload_len` payload bytes.
    ///
    /// The header region is zeroed apart from the size field. Refuses
    /// payloads over [`MAX_MESSAGE_LENGTH`].
    pub fn new(payload_len: usize) -> Result<Self> {
        if payload_len as u64 > u64::from(MAX_MESSAGE_LENGTH) {
            return Err(ProtoError::Oversized {
                size: payload_len as u64,
                max: MAX_MESSAGE_LENGTH,
            }
            .into());
        }
        let mut buf = vec![0u8; HEADER_SIZE + payload_len];
        let header = MessageHeader {
            size: payload_len as u32,
            mtype: 0,
        };
        buf[..HEADER_SIZE].copy_from_slice(&header.encode());
        Ok(Self { buf })
    }

    /// Allocates a buffer and marshals `msg` into it.
    pub fn from_message(msg: &Message) -> Result<Self> {
        let payload = msg.encode_payload();
        let mut buffer = Self::new(payload.len())?;
        buffer.payload_mut().copy_from_slice(&payload);
        Ok(buffer)
    }

    /// The payload region.
    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_SIZE..]
    }

    /// The payload region, writable.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_SIZE..]
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.buf.len() - HEADER_SIZE
    }

    /// Writes the final header in front of the payload.
    pub(crate) fn stamp(&mut self, mtype: MessageType) {
        let header = MessageHeader {
            size: self.payload_len() as u32,
            mtype: mtype.into(),
        };
        self.buf[..HEADER_SIZE].copy_from_slice(&header.encode());
    }

    /// The complete header + payload span to put on the wire.
    pub(crate) fn as_wire(&self) -> &[u8] {
        &self.buf
    }
}
