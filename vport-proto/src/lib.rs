//! Wire protocol for the vport client↔agent port channel.
//!
//! Every frame is a fixed 8-byte header (`size` and `type`, both u32
//! big-endian; `size` excludes the header) followed by exactly `size`
//! payload bytes. [`FrameReader`] reassembles frames from arbitrarily
//! chunked input and recovers from malformed headers by resynchronizing
//! one byte at a time, so a damaged stream never desynchronizes the
//! session permanently.

mod caps;
mod codec;
mod message;
mod reader;

pub use caps::{Capability, CapabilitySet};
pub use codec::{HEADER_SIZE, MAX_MESSAGE_LENGTH, MessageHeader, ProtoError, encode_frame};
pub use message::{
    MAX_MESSAGE_TYPE, Message, MessageType, PrintJob, PrintJobData, SharePrinter, UnsharePrinter,
};
pub use reader::FrameReader;
