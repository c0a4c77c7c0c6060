//! Channel driver: pumps a byte-stream transport into a session.

use std::io;
#[cfg(unix)]
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::session::PortSession;

/// Connects to a guest agent through its Unix socket.
#[cfg(unix)]
pub async fn connect_unix(path: impl AsRef<Path>) -> io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// Drives `session` from a bidirectional transport until it closes.
///
/// Raises channel-up with the write half, feeds inbound chunks to
/// [`PortSession::handle_data`] in order from this single task, and
/// raises channel-down on EOF or read error. A clean EOF returns `Ok`.
pub async fn run<S>(session: PortSession, stream: S) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    session.channel_up(writer);
    let mut chunk = [0u8; 8192];
    let result = loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break Ok(()),
            Ok(n) => session.handle_data(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break Err(e),
        }
    };
    session.channel_down();
    result
}
