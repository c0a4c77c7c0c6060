//! Outbound writer task.
//!
//! One task per open channel drains a queue of stamped frames and
//! writes them sequentially. Cancellation is checked around the write
//! and again before invoking any continuation, so a continuation whose
//! operation completes after channel close is dropped, never called.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::warn;

use crate::buffer::MsgBuffer;
use crate::cancel::CancelToken;

/// Continuation invoked with the write result, unless cancelled first.
pub(crate) type SendCallback = Box<dyn FnOnce(io::Result<()>) + Send + 'static>;

/// One queued outbound frame.
pub(crate) struct Outbound {
    /// Stamped header + payload, released on every completion path.
    pub(crate) frame: MsgBuffer,
    /// Present for `send_async`; `None` is fire-and-forget.
    pub(crate) done: Option<SendCallback>,
}

/// Drains the outbound queue into `sink` until cancelled or closed.
pub(crate) async fn write_loop<W>(
    mut sink: W,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    mut cancel: CancelToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = queue.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        let result = tokio::select! {
            // In-flight write abandoned; the continuation is dropped.
            _ = cancel.cancelled() => break,
            result = write_frame(&mut sink, &item.frame) => result,
        };
        if cancel.is_cancelled() {
            break;
        }
        match item.done {
            Some(done) => done(result),
            None => {
                if let Err(e) = result {
                    warn!("error sending message: {e}");
                }
            }
        }
    }
    // Anything still queued is dropped along with its continuation;
    // the session may already be tearing down.
}

async fn write_frame<W: AsyncWrite + Unpin>(sink: &mut W, frame: &MsgBuffer) -> io::Result<()> {
    sink.write_all(frame.as_wire()).await?;
    sink.flush().await
}
