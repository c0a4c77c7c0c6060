//! Full-session tests over an in-memory duplex transport.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::time::{sleep, timeout};

use vport::{
    Capability, Error, Message, MessageType, MsgBuffer, NullPrinter, PortSession, PrintHandler,
    PrintJob, PrintJobData,
};
use vport_proto::{CapabilitySet, FrameReader, HEADER_SIZE, encode_frame};

/// Print handler that records everything it is handed.
#[derive(Default)]
struct RecordingPrinter {
    jobs: Mutex<Vec<PrintJob>>,
    chunks: Mutex<Vec<PrintJobData>>,
}

impl PrintHandler for RecordingPrinter {
    fn job_started(&self, job: &PrintJob) {
        self.jobs.lock().unwrap().push(job.clone());
    }

    fn job_data(&self, chunk: &PrintJobData) {
        self.chunks.lock().unwrap().push(chunk.clone());
    }
}

fn caps_frame(bits: &[u32]) -> Vec<u8> {
    let mut caps = CapabilitySet::new();
    for &bit in bits {
        caps.set(bit);
    }
    encode_frame(&Message::Capabilities(caps)).unwrap()
}

/// Opens a session over a duplex pipe, returning the remote end.
fn open_session(session: &PortSession) -> tokio::io::DuplexStream {
    let (local, remote) = tokio::io::duplex(4096);
    let (_discard_read, write) = tokio::io::split(local);
    session.channel_up(write);
    remote
}

/// Reads frames off the remote end until `count` messages arrived.
async fn read_messages(remote: &mut tokio::io::DuplexStream, count: usize) -> Vec<Message> {
    let mut reader = FrameReader::new();
    let mut messages = Vec::new();
    let mut buf = [0u8; 512];
    while messages.len() < count {
        let n = timeout(Duration::from_secs(5), remote.read(&mut buf))
            .await
            .expect("timed out waiting for frames")
            .expect("channel closed early");
        assert!(n > 0, "channel closed early");
        messages.extend(reader.feed(&buf[..n]));
    }
    messages
}

#[tokio::test]
async fn open_announces_reset_and_local_capabilities() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let mut remote = open_session(&session);
    assert!(session.is_connected());

    let messages = read_messages(&mut remote, 2).await;
    assert_eq!(messages[0], Message::Reset);
    let Message::Capabilities(local) = &messages[1] else {
        panic!("expected capabilities advertisement, got {:?}", messages[1]);
    };
    assert!(local.supports(Capability::Printing));
}

#[tokio::test]
async fn negotiates_capabilities_split_across_chunks() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let _remote = open_session(&session);

    let notified = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&notified);
    session.on_agent_connected(move || flag.store(true, Ordering::SeqCst));

    // Header first, payload (bit 0 set) second.
    let frame = caps_frame(&[0]);
    session.handle_data(&frame[..HEADER_SIZE]);
    assert!(!notified.load(Ordering::SeqCst));
    assert!(!session.agent_supports(Capability::Printing));

    session.handle_data(&frame[HEADER_SIZE..]);
    assert!(notified.load(Ordering::SeqCst));
    assert!(session.agent_supports(Capability::Printing));
    assert!(!session.agent_supports(1u32));
}

#[tokio::test]
async fn observers_fire_in_registration_order() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let _remote = open_session(&session);

    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        session.on_agent_connected(move || order.lock().unwrap().push(name));
    }

    session.handle_data(&caps_frame(&[0]));
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
}

#[tokio::test]
async fn unsubscribed_observer_does_not_fire() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let _remote = open_session(&session);

    let count = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&count);
    let handle = session.on_agent_connected(move || *counter.lock().unwrap() += 1);

    session.handle_data(&caps_frame(&[0]));
    session.unsubscribe(handle);
    session.handle_data(&caps_frame(&[0]));
    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test]
async fn capability_replacement_is_wholesale() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let _remote = open_session(&session);

    session.handle_data(&caps_frame(&[2]));
    assert!(session.agent_supports(2u32));

    session.handle_data(&caps_frame(&[1, 3]));
    assert!(session.agent_supports(1u32));
    assert!(session.agent_supports(3u32));
    assert!(!session.agent_supports(2u32));
}

#[tokio::test]
async fn disconnect_hides_cached_capabilities() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let _remote = open_session(&session);

    session.handle_data(&caps_frame(&[0]));
    assert!(session.agent_supports(Capability::Printing));

    session.channel_down();
    assert!(!session.is_connected());
    assert!(!session.agent_supports(Capability::Printing));
    assert!(session.agent_capabilities().is_none());
}

#[tokio::test]
async fn print_traffic_reaches_the_handler() {
    let printer = Arc::new(RecordingPrinter::default());
    let session = PortSession::new(Arc::clone(&printer) as Arc<dyn PrintHandler>);
    let _remote = open_session(&session);

    let job = Message::PrintJob(PrintJob {
        id: 3,
        options: b"collate".to_vec(),
    });
    let data = Message::PrintJobData(PrintJobData {
        id: 3,
        data: b"chunk".to_vec(),
    });
    let end = Message::PrintJobData(PrintJobData {
        id: 3,
        data: Vec::new(),
    });
    let mut stream = Vec::new();
    for msg in [&job, &data, &end] {
        stream.extend(encode_frame(msg).unwrap());
    }
    session.handle_data(&stream);

    let jobs = printer.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, 3);
    let chunks = printer.chunks.lock().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].data, b"chunk");
    assert!(chunks[1].data.is_empty());
}

#[tokio::test]
async fn share_and_unshare_hit_the_wire() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let mut remote = open_session(&session);

    session.share_printer("Front Desk", b"*PPD-Adobe").unwrap();
    session.unshare_printer("Front Desk").unwrap();

    // Two announcement frames precede the printer operations.
    let messages = read_messages(&mut remote, 4).await;
    let Message::SharePrinter(share) = &messages[2] else {
        panic!("expected share-printer frame, got {:?}", messages[2]);
    };
    assert_eq!(share.printer, "Front Desk");
    assert_eq!(share.ppd, b"*PPD-Adobe");
    let Message::UnsharePrinter(unshare) = &messages[3] else {
        panic!("expected unshare-printer frame, got {:?}", messages[3]);
    };
    assert_eq!(unshare.printer, "Front Desk");
}

#[tokio::test]
async fn sending_while_disconnected_fails_without_a_channel() {
    let session = PortSession::new(Arc::new(NullPrinter));
    assert!(matches!(
        session.send_message(&Message::Reset),
        Err(Error::NotConnected)
    ));

    // After an explicit close, sends fail the same way.
    let _remote = open_session(&session);
    session.channel_down();
    assert!(matches!(
        session.share_printer("p", b""),
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn outstanding_continuation_is_dropped_on_close() {
    // Capacity smaller than the announcement frames: the writer jams
    // with our send still queued behind it.
    let (local, remote) = tokio::io::duplex(16);
    let session = PortSession::new(Arc::new(NullPrinter));
    let (_discard_read, write) = tokio::io::split(local);
    session.channel_up(write);

    let invoked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&invoked);
    let buffer = MsgBuffer::from_message(&Message::Reset).unwrap();
    session
        .send_async(MessageType::Reset, buffer, move |_result| {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    sleep(Duration::from_millis(20)).await;
    session.channel_down();
    sleep(Duration::from_millis(50)).await;

    assert!(!invoked.load(Ordering::SeqCst));
    drop(remote);
}

#[tokio::test]
async fn continuation_runs_when_the_write_completes() {
    let session = PortSession::new(Arc::new(NullPrinter));
    let mut remote = open_session(&session);

    let delivered = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&delivered);
    let buffer = MsgBuffer::from_message(&Message::Reset).unwrap();
    session
        .send_async(MessageType::Reset, buffer, move |result| {
            assert!(result.is_ok());
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    // Announcements + our reset: three frames total.
    let messages = read_messages(&mut remote, 3).await;
    assert_eq!(messages[2], Message::Reset);
    timeout(Duration::from_secs(5), async {
        while !delivered.load(Ordering::SeqCst) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("continuation never ran");
}

#[tokio::test]
async fn run_disconnects_on_eof() {
    let (local, remote) = tokio::io::duplex(4096);
    let session = PortSession::new(Arc::new(NullPrinter));
    let driver = tokio::spawn(vport::run(session.clone(), local));

    timeout(Duration::from_secs(5), async {
        while !session.is_connected() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session never connected");

    drop(remote);
    driver.await.unwrap().unwrap();
    assert!(!session.is_connected());
}
