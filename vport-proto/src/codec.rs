//! Message header codec and whole-frame encoding.
//!
//! The header is two u32 fields, `size` then `type`, big-endian on the
//! wire regardless of host order. `size` counts payload bytes only.

use crate::message::{MAX_MESSAGE_TYPE, Message, MessageType};

/// Wire size of a message header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Maximum allowed payload size (64 KiB).
pub const MAX_MESSAGE_LENGTH: u32 = 64 * 1024;

/// Errors produced while encoding or decoding protocol data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// A declared or produced payload exceeds [`MAX_MESSAGE_LENGTH`].
    #[error("oversized message ({size} > {max})")]
    Oversized {
        /// The offending payload size.
        size: u64,
        /// The limit it exceeds.
        max: u32,
    },

    /// The header's type field is outside the known range.
    #[error("unknown message type {0}")]
    UnknownType(u32),

    /// The declared size does not match the payload layout for the type.
    #[error("wrong message size on reception ({size} for {mtype:?})")]
    WrongSize {
        /// The message type whose layout was violated.
        mtype: MessageType,
        /// The declared payload size.
        size: u32,
    },

    /// The payload bytes are structurally invalid for the type.
    #[error("malformed {mtype:?} payload")]
    Malformed {
        /// The message type whose payload failed validation.
        mtype: MessageType,
    },
}

/// Fixed-width frame prefix: payload size and message type.
///
/// Constructed per outbound message and parsed per inbound frame; never
/// persisted. The `mtype` field is kept raw here so that a parsed header
/// can be reported in diagnostics even when the type is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Payload length in bytes, excluding the header itself.
    pub size: u32,
    /// Raw message type discriminant.
    pub mtype: u32,
}

impl MessageHeader {
    /// Encodes the header into its 8-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[..4].copy_from_slice(&self.size.to_be_bytes());
        raw[4..].copy_from_slice(&self.mtype.to_be_bytes());
        raw
    }

    /// Decodes a header from its 8-byte wire form.
    pub fn decode(raw: [u8; HEADER_SIZE]) -> Self {
        Self {
            size: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            mtype: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }

    /// Checks the size bound and type range, yielding the typed discriminant.
    pub fn validate(&self) -> Result<MessageType, ProtoError> {
        if self.size > MAX_MESSAGE_LENGTH {
            return Err(ProtoError::Oversized {
                size: u64::from(self.size),
                max: MAX_MESSAGE_LENGTH,
            });
        }
        if self.mtype >= MAX_MESSAGE_TYPE {
            return Err(ProtoError::UnknownType(self.mtype));
        }
        MessageType::from_u32(self.mtype).ok_or(ProtoError::UnknownType(self.mtype))
    }
}

/// Encodes a message as a complete header + payload frame.
///
/// Refuses payloads over [`MAX_MESSAGE_LENGTH`]; an oversized frame
/// would only trigger the peer's resynchronization path.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, ProtoError> {
    let payload = msg.encode_payload();
    if payload.len() as u64 > u64::from(MAX_MESSAGE_LENGTH) {
        return Err(ProtoError::Oversized {
            size: payload.len() as u64,
            max: MAX_MESSAGE_LENGTH,
        });
    }
    let header = MessageHeader {
        size: payload.len() as u32,
        mtype: msg.message_type() as u32,
    };
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(&payload);
    Ok(frame)
}
