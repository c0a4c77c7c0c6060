//! Error types for vport operations.

/// Alias for `Result<T, vport::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by vport session and control-plane operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation requires a connected guest agent.
    #[error("the guest agent is not connected")]
    NotConnected,

    /// The channel writer has gone away; nothing was queued.
    #[error("port channel is closed")]
    ChannelClosed,

    /// Wire-level encode or decode failure.
    #[error(transparent)]
    Proto(#[from] vport_proto::ProtoError),

    /// I/O error from the channel transport or the spooler.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// HTTP failure from the control-plane client.
    #[error(transparent)]
    Http(#[from] Box<ureq::Error>),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Self::Http(Box::new(err))
    }
}
