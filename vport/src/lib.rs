//! Client for the vport guest-agent port channel.
//!
//! A [`PortSession`] owns one bidirectional byte-stream channel to the
//! remote guest agent: it reassembles inbound frames, negotiates the
//! agent's capability set, forwards print traffic to a
//! [`PrintHandler`], and provides an asynchronous, cancellable send
//! path. The wire format lives in [`vport_proto`].
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vport::{FileSpooler, PortSession};
//!
//! # async fn demo() -> vport::Result<()> {
//! let spooler = Arc::new(FileSpooler::new("/var/spool/vport")?);
//! let session = PortSession::new(spooler);
//! let stream = vport::connect_unix("/run/vport/agent.sock").await?;
//! vport::run(session, stream).await?;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod cancel;
mod channel;
mod error;
mod print;
mod request;
mod session;
mod writer;

pub use buffer::MsgBuffer;
#[cfg(unix)]
pub use channel::connect_unix;
pub use channel::run;
pub use error::{Error, Result};
pub use print::{FileSpooler, NullPrinter, PrintHandler};
pub use request::{ControlClient, hide_json_password};
pub use session::{ObserverHandle, PortSession};
pub use vport_proto::{
    Capability, CapabilitySet, Message, MessageType, PrintJob, PrintJobData, ProtoError,
    SharePrinter, UnsharePrinter,
};

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
