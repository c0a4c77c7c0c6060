//! Port session: channel lifecycle, frame dispatch, capability state.
//!
//! One [`PortSession`] owns one channel to the guest agent. Inbound
//! bytes are fed through [`PortSession::handle_data`] from a single
//! driver task and processed synchronously to completion; outbound
//! sends may be issued concurrently from anywhere and never block.
//! Sessions are cheap handles — clone freely.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vport_proto::{
    Capability, CapabilitySet, FrameReader, HEADER_SIZE, Message, MessageType, SharePrinter,
    UnsharePrinter,
};

use crate::buffer::MsgBuffer;
use crate::cancel::CancelSource;
use crate::error::{Error, Result};
use crate::lock;
use crate::print::PrintHandler;
use crate::writer::{self, Outbound, SendCallback};

type ObserverFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Handle identifying one agent-connected observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverHandle(u64);

/// Stateful owner of one channel's framing, dispatch, and capability
/// negotiation.
#[derive(Clone)]
pub struct PortSession {
    inner: Arc<Inner>,
}

struct Inner {
    /// Print collaborator receiving job dispatches.
    print: Arc<dyn PrintHandler>,
    /// Channel state; mutated by the single inbound path and the send
    /// primitives.
    state: Mutex<PortState>,
    /// Agent-connected observers, in registration order.
    observers: Mutex<Vec<(u64, ObserverFn)>>,
    /// Next observer handle id.
    next_observer: AtomicU64,
}

/// Per-channel mutable state.
struct PortState {
    /// Whether a guest agent is connected.
    connected: bool,
    /// Cancellation source for the current channel, if open.
    cancel: Option<CancelSource>,
    /// Queue handle to the current writer task, if open.
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    /// Frame reassembly state for the inbound stream.
    reader: FrameReader,
    /// Capability set negotiated with the connected agent.
    caps: CapabilitySet,
}

impl PortSession {
    /// Creates a disconnected session forwarding print traffic to
    /// `print`.
    pub fn new(print: Arc<dyn PrintHandler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                print,
                state: Mutex::new(PortState {
                    connected: false,
                    cancel: None,
                    outbound: None,
                    reader: FrameReader::new(),
                    caps: CapabilitySet::new(),
                }),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
            }),
        }
    }

    /// Channel-opened notification.
    ///
    /// Spawns the writer task over `sink`, resets the frame reader,
    /// clears the negotiated capability set, then immediately sends a
    /// reset message and an advertisement of locally supported
    /// features. Must be called from within a tokio runtime.
    pub fn channel_up<W>(&self, sink: W)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut state = lock(&self.inner.state);
        if state.connected {
            warn!("channel opened while already connected; resetting session");
            teardown(&mut state);
        }
        info!("guest agent connected");

        let cancel = CancelSource::new();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer::write_loop(sink, rx, cancel.token()));

        state.connected = true;
        state.cancel = Some(cancel);
        state.outbound = Some(tx);
        state.reader.reset();
        state.caps.clear();

        let mut local = CapabilitySet::new();
        local.set(Capability::Printing);
        for msg in [Message::Reset, Message::Capabilities(local)] {
            match MsgBuffer::from_message(&msg) {
                Ok(buffer) => {
                    if let Err(e) = enqueue(&mut state, msg.message_type(), buffer, None) {
                        warn!("cannot announce session: {e}");
                    }
                }
                Err(e) => warn!("cannot announce session: {e}"),
            }
        }
    }

    /// Channel-closed notification.
    ///
    /// Cancels the channel token — in-flight and queued sends resolve
    /// as cancelled and their continuations are discarded — and
    /// releases the receive buffer.
    pub fn channel_down(&self) {
        let mut state = lock(&self.inner.state);
        if !state.connected {
            return;
        }
        info!("guest agent disconnected");
        teardown(&mut state);
    }

    /// Inbound data notification; must come from a single driver task.
    ///
    /// Feeds the frame reader and dispatches every completed message
    /// before returning.
    pub fn handle_data(&self, chunk: &[u8]) {
        let messages = {
            let mut state = lock(&self.inner.state);
            if !state.connected {
                return;
            }
            state.reader.feed(chunk)
        };
        for msg in messages {
            self.dispatch(msg);
        }
    }

    /// Whether a guest agent is currently connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.inner.state).connected
    }

    /// Whether the connected agent supports `cap`.
    ///
    /// Always false while disconnected, whatever was negotiated before.
    pub fn agent_supports(&self, cap: impl Into<u32>) -> bool {
        let state = lock(&self.inner.state);
        state.connected && state.caps.supports(cap)
    }

    /// The negotiated capability set, if an agent is connected.
    pub fn agent_capabilities(&self) -> Option<CapabilitySet> {
        let state = lock(&self.inner.state);
        state.connected.then_some(state.caps)
    }

    /// Registers an observer fired after each capability negotiation.
    ///
    /// Observers run synchronously on the inbound path, in registration
    /// order, from a snapshot — registering or unsubscribing from
    /// inside an observer is safe.
    pub fn on_agent_connected(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverHandle {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.observers).push((id, Arc::new(observer)));
        ObserverHandle(id)
    }

    /// Removes a previously registered observer.
    pub fn unsubscribe(&self, handle: ObserverHandle) {
        lock(&self.inner.observers).retain(|(id, _)| *id != handle.0);
    }

    /// Fire-and-forget send: the buffer is released once the write
    /// completes; failures are logged and absorbed.
    pub fn send(&self, mtype: MessageType, buffer: MsgBuffer) -> Result<()> {
        self.send_impl(mtype, buffer, None)
    }

    /// Send with a continuation receiving the write result.
    ///
    /// If the channel closes before the write completes, the
    /// continuation is dropped without being invoked.
    pub fn send_async(
        &self,
        mtype: MessageType,
        buffer: MsgBuffer,
        done: impl FnOnce(io::Result<()>) + Send + 'static,
    ) -> Result<()> {
        self.send_impl(mtype, buffer, Some(Box::new(done)))
    }

    /// Marshals and sends a typed message, fire-and-forget.
    pub fn send_message(&self, msg: &Message) -> Result<()> {
        self.send(msg.message_type(), MsgBuffer::from_message(msg)?)
    }

    /// Shares a client printer with the connected agent.
    ///
    /// Fails immediately with [`Error::NotConnected`] when no agent is
    /// connected; the channel is never touched in that case.
    pub fn share_printer(&self, printer: &str, ppd: &[u8]) -> Result<()> {
        self.send_message(&Message::SharePrinter(SharePrinter {
            printer: printer.to_owned(),
            ppd: ppd.to_vec(),
        }))
    }

    /// Withdraws a previously shared printer.
    pub fn unshare_printer(&self, printer: &str) -> Result<()> {
        self.send_message(&Message::UnsharePrinter(UnsharePrinter {
            printer: printer.to_owned(),
        }))
    }

    fn send_impl(
        &self,
        mtype: MessageType,
        buffer: MsgBuffer,
        done: Option<SendCallback>,
    ) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if !state.connected {
            warn!("the guest agent is not connected");
            return Err(Error::NotConnected);
        }
        enqueue(&mut state, mtype, buffer, done)
    }

    /// Routes one decoded message to its handler.
    ///
    /// In-range types without a client-side handler (reset, printer
    /// sharing requests echoed back) are dropped without comment.
    fn dispatch(&self, msg: Message) {
        match msg {
            Message::Capabilities(set) => {
                {
                    let mut state = lock(&self.inner.state);
                    state.caps = set;
                    let words = state.caps.words();
                    debug!(
                        "guest agent capabilities: {:08x} {:08x} {:08x} {:08x}",
                        words[3], words[2], words[1], words[0]
                    );
                }
                let snapshot: Vec<ObserverFn> = lock(&self.inner.observers)
                    .iter()
                    .map(|(_, observer)| Arc::clone(observer))
                    .collect();
                for observer in snapshot {
                    (*observer)();
                }
            }
            Message::PrintJob(job) => self.inner.print.job_started(&job),
            Message::PrintJobData(chunk) => self.inner.print.job_data(&chunk),
            _ => {}
        }
    }
}

impl fmt::Debug for PortSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSession")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Stamps the type into the frame header and queues it on the writer
/// task.
fn enqueue(
    state: &mut PortState,
    mtype: MessageType,
    mut frame: MsgBuffer,
    done: Option<SendCallback>,
) -> Result<()> {
    let Some(tx) = state.outbound.as_ref() else {
        return Err(Error::ChannelClosed);
    };
    frame.stamp(mtype);
    debug!(
        "sending message type {}, size {}",
        u32::from(mtype),
        HEADER_SIZE + frame.payload_len()
    );
    tx.send(Outbound { frame, done })
        .map_err(|_| Error::ChannelClosed)
}

/// Drops the channel: cancels outstanding operations and releases the
/// receive buffer.
fn teardown(state: &mut PortState) {
    state.connected = false;
    if let Some(cancel) = state.cancel.take() {
        cancel.cancel();
    }
    state.outbound = None;
    state.reader.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::NullPrinter;

    #[test]
    fn disconnected_session_rejects_sends() {
        let session = PortSession::new(Arc::new(NullPrinter));
        assert!(matches!(
            session.send_message(&Message::Reset),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            session.share_printer("laser", b""),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            session.unshare_printer("laser"),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn disconnected_session_supports_nothing() {
        let session = PortSession::new(Arc::new(NullPrinter));
        assert!(!session.agent_supports(Capability::Printing));
        assert!(session.agent_capabilities().is_none());
        assert!(!session.is_connected());
    }

    #[test]
    fn unsubscribe_removes_the_right_observer() {
        let session = PortSession::new(Arc::new(NullPrinter));
        let first = session.on_agent_connected(|| {});
        let second = session.on_agent_connected(|| {});
        assert_ne!(first, second);
        session.unsubscribe(first);
        session.unsubscribe(first); // double unsubscribe is harmless
        session.unsubscribe(second);
    }
}
