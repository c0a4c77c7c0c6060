//! Typed message payloads and their wire marshalling.
//!
//! Integer fields are big-endian, matching the header. Each type
//! validates the declared payload size exactly: fixed-size types must
//! match to the byte, variable-size types must account for every
//! declared byte through their internal length fields.

use crate::caps::{CAPABILITY_WORDS, CapabilitySet};
use crate::codec::ProtoError;

/// Exclusive upper bound on valid message type discriminants.
pub const MAX_MESSAGE_TYPE: u32 = 6;

/// Message type discriminant carried in the frame header.
///
/// The set is closed by the wire format: every discriminant below
/// [`MAX_MESSAGE_TYPE`] is listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    /// Session reset; carries no payload.
    Reset = 0,
    /// Capability bitset advertisement.
    Capabilities = 1,
    /// Start of a print job.
    PrintJob = 2,
    /// A chunk of raw print-job data.
    PrintJobData = 3,
    /// Share a client printer with the agent.
    SharePrinter = 4,
    /// Withdraw a previously shared printer.
    UnsharePrinter = 5,
}

impl MessageType {
    /// Maps a raw discriminant to a known type.
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Reset),
            1 => Some(Self::Capabilities),
            2 => Some(Self::PrintJob),
            3 => Some(Self::PrintJobData),
            4 => Some(Self::SharePrinter),
            5 => Some(Self::UnsharePrinter),
            _ => None,
        }
    }
}

impl From<MessageType> for u32 {
    fn from(mtype: MessageType) -> Self {
        mtype as Self
    }
}

/// Start of a print job: job id plus opaque option bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    /// Job identifier, scoped to the session.
    pub id: u32,
    /// Driver options, opaque to the protocol.
    pub options: Vec<u8>,
}

/// A chunk of raw page-description data for an open job.
///
/// An empty chunk marks the end of the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJobData {
    /// Job identifier the data belongs to.
    pub id: u32,
    /// Raw print data bytes.
    pub data: Vec<u8>,
}

/// Share a client printer with the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePrinter {
    /// Printer name as known to the client.
    pub printer: String,
    /// PPD contents describing the printer.
    pub ppd: Vec<u8>,
}

/// Withdraw a previously shared printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsharePrinter {
    /// Printer name as known to the client.
    pub printer: String,
}

/// A fully decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// Session reset.
    Reset,
    /// Capability advertisement from either side.
    Capabilities(CapabilitySet),
    /// Start of a print job.
    PrintJob(PrintJob),
    /// Print-job data chunk.
    PrintJobData(PrintJobData),
    /// Share-printer request.
    SharePrinter(SharePrinter),
    /// Unshare-printer request.
    UnsharePrinter(UnsharePrinter),
}

impl Message {
    /// Returns the wire discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Reset => MessageType::Reset,
            Self::Capabilities(_) => MessageType::Capabilities,
            Self::PrintJob(_) => MessageType::PrintJob,
            Self::PrintJobData(_) => MessageType::PrintJobData,
            Self::SharePrinter(_) => MessageType::SharePrinter,
            Self::UnsharePrinter(_) => MessageType::UnsharePrinter,
        }
    }

    /// Decodes and validates a payload of the given type.
    ///
    /// `payload` must be exactly the number of bytes the frame header
    /// declared; any layout mismatch drops the frame at the caller.
    pub fn decode(mtype: MessageType, payload: &[u8]) -> Result<Self, ProtoError> {
        let size = payload.len() as u32;
        let wrong_size = ProtoError::WrongSize { mtype, size };
        match mtype {
            MessageType::Reset => {
                if !payload.is_empty() {
                    return Err(wrong_size);
                }
                Ok(Self::Reset)
            }
            MessageType::Capabilities => {
                if payload.len() != CAPABILITY_WORDS * 4 {
                    return Err(wrong_size);
                }
                let mut words = [0u32; CAPABILITY_WORDS];
                for (i, word) in words.iter_mut().enumerate() {
                    *word = read_u32(payload, i * 4);
                }
                Ok(Self::Capabilities(CapabilitySet::from_words(words)))
            }
            MessageType::PrintJob => {
                if payload.len() < 8 {
                    return Err(wrong_size);
                }
                let id = read_u32(payload, 0);
                let options_len = u64::from(read_u32(payload, 4));
                if payload.len() as u64 != 8 + options_len {
                    return Err(wrong_size);
                }
                Ok(Self::PrintJob(PrintJob {
                    id,
                    options: payload[8..].to_vec(),
                }))
            }
            MessageType::PrintJobData => {
                if payload.len() < 8 {
                    return Err(wrong_size);
                }
                let id = read_u32(payload, 0);
                let data_len = u64::from(read_u32(payload, 4));
                if payload.len() as u64 != 8 + data_len {
                    return Err(wrong_size);
                }
                Ok(Self::PrintJobData(PrintJobData {
                    id,
                    data: payload[8..].to_vec(),
                }))
            }
            MessageType::SharePrinter => {
                if payload.len() < 8 {
                    return Err(wrong_size);
                }
                let name_len = u64::from(read_u32(payload, 0));
                let ppd_len = u64::from(read_u32(payload, 4));
                if payload.len() as u64 != 8 + name_len + ppd_len {
                    return Err(wrong_size);
                }
                let name_end = 8 + name_len as usize;
                let printer = std::str::from_utf8(&payload[8..name_end])
                    .map_err(|_| ProtoError::Malformed { mtype })?
                    .to_owned();
                Ok(Self::SharePrinter(SharePrinter {
                    printer,
                    ppd: payload[name_end..].to_vec(),
                }))
            }
            MessageType::UnsharePrinter => {
                if payload.len() < 4 {
                    return Err(wrong_size);
                }
                let name_len = u64::from(read_u32(payload, 0));
                if payload.len() as u64 != 4 + name_len {
                    return Err(wrong_size);
                }
                let printer = std::str::from_utf8(&payload[4..])
                    .map_err(|_| ProtoError::Malformed { mtype })?
                    .to_owned();
                Ok(Self::UnsharePrinter(UnsharePrinter { printer }))
            }
        }
    }

    /// Marshals the payload into its wire form, without the header.
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::Reset => Vec::new(),
            Self::Capabilities(caps) => {
                let mut out = Vec::with_capacity(CAPABILITY_WORDS * 4);
                for word in caps.words() {
                    out.extend_from_slice(&word.to_be_bytes());
                }
                out
            }
            Self::PrintJob(job) => {
                let mut out = Vec::with_capacity(8 + job.options.len());
                out.extend_from_slice(&job.id.to_be_bytes());
                out.extend_from_slice(&(job.options.len() as u32).to_be_bytes());
                out.extend_from_slice(&job.options);
                out
            }
            Self::PrintJobData(chunk) => {
                let mut out = Vec::with_capacity(8 + chunk.data.len());
                out.extend_from_slice(&chunk.id.to_be_bytes());
                out.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
                out.extend_from_slice(&chunk.data);
                out
            }
            Self::SharePrinter(share) => {
                let name = share.printer.as_bytes();
                let mut out = Vec::with_capacity(8 + name.len() + share.ppd.len());
                out.extend_from_slice(&(name.len() as u32).to_be_bytes());
                out.extend_from_slice(&(share.ppd.len() as u32).to_be_bytes());
                out.extend_from_slice(name);
                out.extend_from_slice(&share.ppd);
                out
            }
            Self::UnsharePrinter(unshare) => {
                let name = unshare.printer.as_bytes();
                let mut out = Vec::with_capacity(4 + name.len());
                out.extend_from_slice(&(name.len() as u32).to_be_bytes());
                out.extend_from_slice(name);
                out
            }
        }
    }
}

/// Reads a big-endian u32 at `at`; the caller has already checked bounds.
fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) {
        let payload = msg.encode_payload();
        let decoded = Message::decode(msg.message_type(), &payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_all_types() {
        let mut caps = CapabilitySet::new();
        caps.set(0u32);
        caps.set(66u32);
        roundtrip(Message::Reset);
        roundtrip(Message::Capabilities(caps));
        roundtrip(Message::PrintJob(PrintJob {
            id: 7,
            options: b"media=a4".to_vec(),
        }));
        roundtrip(Message::PrintJobData(PrintJobData {
            id: 7,
            data: vec![0x1b, 0x45, 0x00],
        }));
        roundtrip(Message::SharePrinter(SharePrinter {
            printer: "Front Desk".into(),
            ppd: b"*PPD-Adobe: \"4.3\"".to_vec(),
        }));
        roundtrip(Message::UnsharePrinter(UnsharePrinter {
            printer: "Front Desk".into(),
        }));
    }

    #[test]
    fn reset_rejects_nonempty_payload() {
        assert!(matches!(
            Message::decode(MessageType::Reset, &[0]),
            Err(ProtoError::WrongSize { .. })
        ));
    }

    #[test]
    fn capabilities_requires_exact_size() {
        assert!(Message::decode(MessageType::Capabilities, &[0u8; 15]).is_err());
        assert!(Message::decode(MessageType::Capabilities, &[0u8; 17]).is_err());
        assert!(Message::decode(MessageType::Capabilities, &[0u8; 16]).is_ok());
    }

    #[test]
    fn print_job_length_field_must_cover_payload() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&10u32.to_be_bytes()); // claims 10, carries 4
        payload.extend_from_slice(b"opts");
        assert!(matches!(
            Message::decode(MessageType::PrintJob, &payload),
            Err(ProtoError::WrongSize { .. })
        ));
    }

    #[test]
    fn print_job_data_empty_chunk_is_valid() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        let msg = Message::decode(MessageType::PrintJobData, &payload).unwrap();
        assert_eq!(
            msg,
            Message::PrintJobData(PrintJobData {
                id: 3,
                data: Vec::new()
            })
        );
    }

    #[test]
    fn share_printer_rejects_invalid_utf8_name() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&[0xff, 0xfe]);
        assert_eq!(
            Message::decode(MessageType::SharePrinter, &payload),
            Err(ProtoError::Malformed {
                mtype: MessageType::SharePrinter
            })
        );
    }

    #[test]
    fn share_printer_length_overflow_is_rejected() {
        // name_len + ppd_len sums past u32 without panicking.
        let mut payload = Vec::new();
        payload.extend_from_slice(&u32::MAX.to_be_bytes());
        payload.extend_from_slice(&u32::MAX.to_be_bytes());
        payload.extend_from_slice(b"x");
        assert!(matches!(
            Message::decode(MessageType::SharePrinter, &payload),
            Err(ProtoError::WrongSize { .. })
        ));
    }

    #[test]
    fn unknown_discriminants_have_no_type() {
        assert_eq!(MessageType::from_u32(MAX_MESSAGE_TYPE), None);
        for raw in 0..MAX_MESSAGE_TYPE {
            assert_eq!(MessageType::from_u32(raw).map(|t| t as u32), Some(raw));
        }
    }
}
