//! Tests for the TCP writer, reader, and frame splitter.

use std::{
    collections::BTreeSet,
    io::{self, Read},
    net::{SocketAddr, TcpListener},
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use rand::RngCore;
use rstest::{fixture, rstest};

use crate::{
    error::{GelfError, ProtocolError},
    message::{Message, Origin},
    writer::GelfWriter,
};

use super::{
    ConnectionState, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_RECONNECT, DEFAULT_RECONNECT_DELAY,
    FrameReader, ReconnectPolicy, TcpReader, TcpReaderConfig, TcpTransport, TcpWriter,
    TcpWriterConfig, TlsOptions, connect_transport,
};

const TIMEOUT: Duration = Duration::from_secs(2);

#[fixture]
fn reader() -> TcpReader {
    TcpReader::bind_with_config(
        "127.0.0.1:0",
        TcpReaderConfig {
            read_timeout: Some(TIMEOUT),
            ..TcpReaderConfig::default()
        },
    )
    .expect("bind reader")
}

fn policy(max_reconnect: u32, delay_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy {
        max_reconnect,
        reconnect_delay: Duration::from_millis(delay_ms),
    }
}

fn config_for(addr: SocketAddr, reconnect: ReconnectPolicy) -> TcpWriterConfig {
    TcpWriterConfig {
        reconnect,
        origin: Origin::new("tcp-test-host", "tcp_test"),
        ..TcpWriterConfig::default()
    }
    .with_transport(TcpTransport::new(addr.ip().to_string(), addr.port()))
}

fn writer_for(reader: &TcpReader, reconnect: ReconnectPolicy) -> TcpWriter {
    let addr = reader.local_addr().expect("reader address");
    TcpWriter::new(config_for(addr, reconnect))
}

fn random_text(len: usize) -> String {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    format!("awesomesauce\n{}", BASE64_STANDARD.encode(data))
}

fn spawn_reads(reader: TcpReader, count: usize) -> mpsc::Receiver<Result<Message, GelfError>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..count {
            if tx.send(reader.read_message()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Reader yielding at most `step` bytes per call.
struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.step.min(buf.len()).min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        self.data = &self.data[len..];
        Ok(len)
    }
}

#[rstest]
fn config_defaults() {
    let config = TcpWriterConfig::default();
    assert_eq!(config.reconnect.max_reconnect, DEFAULT_MAX_RECONNECT);
    assert_eq!(config.reconnect.max_reconnect, 3);
    assert_eq!(config.reconnect.reconnect_delay, DEFAULT_RECONNECT_DELAY);
    assert_eq!(config.reconnect.reconnect_delay, Duration::from_secs(1));
    assert_eq!(TcpReaderConfig::default().max_frame_size, DEFAULT_MAX_FRAME_SIZE);
}

#[rstest]
fn new_writer_is_lazy() {
    let writer = TcpWriter::new(TcpWriterConfig::default());
    assert_eq!(writer.state(), ConnectionState::Disconnected);
}

#[rstest]
fn connect_fails_without_a_listener() {
    let addr = TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("reserve a port");
    let err = TcpWriter::connect(config_for(addr, policy(1, 10))).expect_err("nothing listens");
    assert!(matches!(err, GelfError::Io(_)));
}

#[rstest]
#[case(b"awesomesauce\nbananas".as_slice(), "awesomesauce", "awesomesauce\nbananas")]
#[case(b"some awesome thing\n".as_slice(), "some awesome thing", "")]
fn text_is_split_into_short_and_full(
    reader: TcpReader,
    #[case] input: &[u8],
    #[case] short: &str,
    #[case] full: &str,
) {
    let writer = writer_for(&reader, policy(1, 10));
    assert_eq!(writer.write(input).expect("write"), input.len());
    assert_eq!(writer.state(), ConnectionState::Connected);

    let message = reader.read_message().expect("read message");
    assert_eq!(message.short, short);
    assert_eq!(message.full, full);
    assert_eq!(message.host, "tcp-test-host");
    assert_eq!(message.facility, "tcp_test");
    assert_eq!(message.extra.len(), 2);
    let file = message.extra["_file"].as_str().expect("_file is a string");
    assert!(file.ends_with("tcp/tests.rs"), "unexpected _file {file}");
}

#[rstest]
fn read_copies_the_message_text(reader: TcpReader) {
    let writer = writer_for(&reader, policy(1, 10));
    writer.write(b"awesomesauce\nbananas").expect("write");
    let mut buf = [0u8; 8];
    assert_eq!(reader.read(&mut buf).expect("read"), 8);
    assert_eq!(&buf, b"awesomes");
}

#[rstest]
#[case(4096)]
#[case(150_000)]
fn large_messages_arrive_whole(reader: TcpReader, #[case] len: usize) {
    let writer = writer_for(&reader, policy(1, 10));
    let received = spawn_reads(reader, 1);
    let text = random_text(len);
    writer.write(text.as_bytes()).expect("write big text");

    let message = received
        .recv_timeout(TIMEOUT)
        .expect("reader finished")
        .expect("decoded");
    assert_eq!(message.short, "awesomesauce");
    assert_eq!(message.full, text);
}

#[rstest]
fn extra_fields_survive_the_trip(reader: TcpReader) {
    let message = Message::new("fake-host", "quick")
        .with_full("quick\nwith more detail")
        .with_facility("tcpwriter_test")
        .with_extra("_a", 42_i64)
        .with_extra("C", 9_i64)
        .with_extra("_file", "tcpwriter_test.rs")
        .with_extra("_line", 186_i64)
        .with_raw_extra(br#"{"woo": "hoo"}"#.to_vec());

    let writer = writer_for(&reader, policy(1, 10));
    writer.write_message(&message).expect("write message");
    let received = reader.read_message().expect("read");

    assert_eq!(received.host, "fake-host");
    assert_eq!(received.facility, "tcpwriter_test");
    assert_eq!(received.extra.len(), 5);
    assert_eq!(received.extra["_line"].as_f64(), Some(186.0));
    assert_eq!(received.extra["woo"].as_str(), Some("hoo"));
}

#[rstest]
fn concurrent_writes_never_interleave(reader: TcpReader) {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;

    let writer = Arc::new(writer_for(&reader, policy(1, 10)));
    let received = spawn_reads(reader, THREADS * PER_THREAD);
    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let text = format!("worker {t} message {i}\n{}", "x".repeat(2048));
                    writer.write(text.as_bytes()).expect("write");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("writer thread");
    }

    let shorts: BTreeSet<String> = (0..THREADS * PER_THREAD)
        .map(|_| {
            received
                .recv_timeout(TIMEOUT)
                .expect("message arrives")
                .expect("decoded")
                .short
        })
        .collect();
    assert_eq!(shorts.len(), THREADS * PER_THREAD);
}

#[rstest]
fn reconnects_after_the_reader_hangs_up(reader: TcpReader) {
    let writer = writer_for(&reader, policy(3, 20));
    writer.write(b"first").expect("write first");
    assert_eq!(reader.read_message().expect("read first").short, "first");

    reader.disconnect();
    thread::sleep(Duration::from_millis(50));
    // Lands in the dead socket's send buffer; the peer answers with a reset.
    writer.write(b"second-a").expect("write into the dead socket");
    thread::sleep(Duration::from_millis(50));
    writer.write(b"second-b").expect("write after redial");

    let mut delivered = Vec::new();
    let err = loop {
        match reader.read_message() {
            Ok(message) => delivered.push(message.short),
            Err(err) => break err,
        }
    };
    assert!(matches!(&err, GelfError::Io(io) if matches!(
        io.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )), "expected a read timeout, got {err:?}");
    assert_eq!(
        delivered.iter().filter(|short| *short == "second-b").count(),
        1,
        "delivered {delivered:?}"
    );
    assert_eq!(delivered.last().map(String::as_str), Some("second-b"));
    assert_eq!(writer.state(), ConnectionState::Connected);
}

#[rstest]
fn broken_peer_is_noticed_on_the_following_write() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut frames = FrameReader::new(stream, DEFAULT_MAX_FRAME_SIZE);
        frames.next_frame().expect("read frame").expect("one frame")
        // stream and listener drop here
    });

    let writer = TcpWriter::new(config_for(addr, policy(1, 10)));
    writer.write(b"first").expect("write first");
    let frame = server.join().expect("server thread");
    assert_eq!(
        crate::message::decode(&frame).expect("decode").short,
        "first"
    );
    thread::sleep(Duration::from_millis(50));

    writer
        .write(b"second")
        .expect("first write after the peer left is accepted locally");
    thread::sleep(Duration::from_millis(100));
    let err = writer.write(b"third").expect_err("broken pipe surfaces");
    assert!(matches!(err, GelfError::Connection { attempts: 1, .. }));
    assert_eq!(writer.state(), ConnectionState::Disconnected);
}

#[rstest]
fn gives_up_after_the_reconnect_budget(reader: TcpReader) {
    let delay_ms = 20;
    let writer = writer_for(&reader, policy(2, delay_ms));
    writer.write(b"hello").expect("write");
    reader.read_message().expect("read");
    drop(reader);
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    let err = (0..5)
        .find_map(|_| {
            let result = writer.write(b"into the void").err();
            thread::sleep(Duration::from_millis(20));
            result
        })
        .expect("a write eventually fails");
    assert!(matches!(err, GelfError::Connection { attempts: 2, .. }));
    assert!(start.elapsed() >= Duration::from_millis(2 * delay_ms));
    assert_eq!(writer.state(), ConnectionState::Disconnected);
}

#[rstest]
fn close_interrupts_a_pending_reconnect() {
    let addr = TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("reserve a port");
    let writer = Arc::new(TcpWriter::new(config_for(addr, policy(5, 10_000))));

    let worker = {
        let writer = Arc::clone(&writer);
        thread::spawn(move || {
            let start = Instant::now();
            let result = writer.write(b"never delivered");
            (result, start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(100));
    assert_eq!(writer.state(), ConnectionState::Reconnecting);

    writer.close();
    let (result, elapsed) = worker.join().expect("writer thread");
    assert!(matches!(result, Err(GelfError::Closed)));
    assert!(elapsed < Duration::from_secs(5), "close took {elapsed:?}");
    assert_eq!(writer.state(), ConnectionState::Closed);
}

#[rstest]
fn closed_writer_refuses_writes(reader: TcpReader) {
    let writer = writer_for(&reader, policy(1, 10));
    writer.write(b"before close").expect("write");
    writer.close();
    assert_eq!(writer.state(), ConnectionState::Closed);
    assert!(matches!(writer.write(b"late"), Err(GelfError::Closed)));
    assert!(matches!(writer.open(), Err(GelfError::Closed)));
}

#[rstest]
fn writer_implements_io_write(reader: TcpReader) {
    use std::io::Write;

    let mut writer = writer_for(&reader, policy(1, 10));
    Write::write_all(&mut writer, b"through io::Write").expect("write_all");
    let message = reader.read_message().expect("read");
    assert_eq!(message.short, "through io::Write");
    assert!(message.extra.is_empty());
}

#[rstest]
fn closed_reader_refuses_reads(reader: TcpReader) {
    reader.close();
    assert!(matches!(reader.read_message(), Err(GelfError::Closed)));
}

#[rstest]
fn close_wakes_a_reader_waiting_for_a_connection(reader: TcpReader) {
    let reader = Arc::new(reader);
    let waiting = Arc::clone(&reader);
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        tx.send(waiting.read_message()).expect("report result");
    });
    thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    reader.close();

    let result = rx.recv_timeout(TIMEOUT).expect("accept was woken");
    assert!(matches!(result, Err(GelfError::Closed)), "got {result:?}");
    assert!(started.elapsed() < TIMEOUT);
    handle.join().expect("reader thread");
}

#[rstest]
fn frames_are_split_across_partial_reads() {
    let data = b"{\"a\":1}\0\0{\"b\":2}\0";
    let mut frames = FrameReader::new(Trickle { data, step: 3 }, 64);
    assert_eq!(frames.next_frame().expect("first"), Some(b"{\"a\":1}".to_vec()));
    assert_eq!(frames.next_frame().expect("second"), Some(b"{\"b\":2}".to_vec()));
    assert_eq!(frames.next_frame().expect("end"), None);
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(4096)]
fn long_frame_built_from_many_reads_is_intact(#[case] step: usize) {
    let long = random_text(6000).into_bytes();
    let mut data = long.clone();
    data.push(0);
    data.extend_from_slice(b"tail\0\0last\0");
    let mut frames = FrameReader::new(Trickle { data: &data, step }, DEFAULT_MAX_FRAME_SIZE);
    assert_eq!(frames.next_frame().expect("long"), Some(long));
    assert_eq!(frames.next_frame().expect("tail"), Some(b"tail".to_vec()));
    assert_eq!(frames.next_frame().expect("last"), Some(b"last".to_vec()));
    assert_eq!(frames.next_frame().expect("end"), None);
}

#[rstest]
#[case(2)]
#[case(64)]
fn oversized_frame_is_reported_then_skipped(#[case] step: usize) {
    let data = b"0123456789abcdef\0short\0";
    let mut frames = FrameReader::new(Trickle { data, step }, 8);
    let err = frames.next_frame().expect_err("frame exceeds limit");
    assert!(matches!(
        err,
        GelfError::Protocol(ProtocolError::FrameTooLarge { limit: 8 })
    ));
    assert_eq!(frames.next_frame().expect("next"), Some(b"short".to_vec()));
    assert_eq!(frames.next_frame().expect("end"), None);
}

#[rstest]
fn partial_frame_at_eof_is_truncated() {
    let data = b"complete\0partial";
    let mut frames = FrameReader::new(Trickle { data, step: 5 }, 64);
    assert_eq!(frames.next_frame().expect("first"), Some(b"complete".to_vec()));
    let err = frames.next_frame().expect_err("truncated");
    assert!(matches!(
        err,
        GelfError::Protocol(ProtocolError::TruncatedFrame { len: 7 })
    ));
    assert_eq!(frames.next_frame().expect("drained"), None);
}

#[rstest]
fn tls_handshake_respects_timeout() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    let (accepted_tx, accepted_rx) = mpsc::channel();
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept connection");
        accepted_tx.send(()).expect("signal accepted");
        // Hold the connection open without speaking TLS.
        thread::sleep(Duration::from_secs(2));
        drop(stream);
    });

    let (result_tx, result_rx) = mpsc::channel();
    thread::spawn(move || {
        let transport = TcpTransport {
            tls: Some(TlsOptions {
                domain: "localhost".into(),
                insecure_skip_verify: true,
            }),
            ..TcpTransport::new(addr.ip().to_string(), addr.port())
        };
        let start = Instant::now();
        let ok = connect_transport(&transport, Duration::from_millis(250)).is_ok();
        result_tx
            .send((ok, start.elapsed()))
            .expect("handshake result should send");
    });

    accepted_rx
        .recv_timeout(Duration::from_secs(1))
        .expect("connection must be accepted");
    let (ok, elapsed) = result_rx
        .recv_timeout(TIMEOUT)
        .expect("handshake result should arrive");
    assert!(!ok, "handshake should fail for a stalled peer");
    assert!(elapsed < TIMEOUT, "elapsed {elapsed:?}");
}
