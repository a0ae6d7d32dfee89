//! Reconnecting TCP writer.
//!
//! All socket activity for one [`TcpWriter`] runs behind a single lock, so at
//! most one write-or-reconnect cycle is in flight per instance. When a write
//! fails the writer redials up to `max_reconnect` times, pausing
//! `reconnect_delay` before each attempt, and resends the pending frame on the
//! first connection that accepts it.
//!
//! Broken peers are only noticed when a write fails. The first write into a
//! socket whose peer has already gone usually succeeds locally; the failure
//! surfaces on the following write.

use std::{
    io,
    net::{Shutdown, TcpStream},
    sync::atomic::{AtomicBool, AtomicU8, Ordering},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::debug;
use parking_lot::Mutex;

use crate::{
    error::GelfError,
    message::{Message, Origin, encode},
    writer::{GelfWriter, impl_io_write},
};

use super::{
    config::TcpWriterConfig,
    transport::{ActiveConnection, connect_transport},
};

/// Byte terminating every frame on the wire.
pub const FRAME_DELIMITER: u8 = 0;

/// Lifecycle of the writer's single outbound connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Reconnecting => 2,
            ConnectionState::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Reconnecting,
            3 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// State machine value owned by the writer. `conn` is present exactly when
/// `state` is `Connected`.
struct Link {
    state: ConnectionState,
    conn: Option<ActiveConnection>,
}

/// Writer sending null-terminated GELF frames over TCP.
pub struct TcpWriter {
    config: TcpWriterConfig,
    link: Mutex<Link>,
    observed: AtomicU8,
    closed: AtomicBool,
    close_signal: Receiver<()>,
    close_trigger: Mutex<Option<Sender<()>>>,
    shutdown_handle: Mutex<Option<TcpStream>>,
}

impl TcpWriter {
    /// Create a writer in the `Disconnected` state. The first write dials.
    pub fn new(config: TcpWriterConfig) -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            config,
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                conn: None,
            }),
            observed: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            closed: AtomicBool::new(false),
            close_signal: signal,
            close_trigger: Mutex::new(Some(trigger)),
            shutdown_handle: Mutex::new(None),
        }
    }

    /// Create a writer and dial immediately.
    pub fn connect(config: TcpWriterConfig) -> Result<Self, GelfError> {
        let writer = Self::new(config);
        writer.open()?;
        Ok(writer)
    }

    /// Dial now if not already connected. A failed dial is returned as is,
    /// without consuming the reconnect budget.
    pub fn open(&self) -> Result<(), GelfError> {
        let mut link = self.link.lock();
        self.ensure_open(&mut link)?;
        if link.conn.is_none() {
            let conn = self.dial()?;
            self.install(&mut link, conn);
        }
        Ok(())
    }

    /// Current connection state. Does not wait for an in-flight write.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.observed.load(Ordering::Acquire))
    }

    pub fn config(&self) -> &TcpWriterConfig {
        &self.config
    }

    /// Append the delimiter to an encoded message and send it.
    pub fn send_encoded(&self, encoded: &[u8]) -> Result<(), GelfError> {
        let mut frame = Vec::with_capacity(encoded.len() + 1);
        frame.extend_from_slice(encoded);
        frame.push(FRAME_DELIMITER);
        self.send_frame(&frame)
    }

    fn send_frame(&self, frame: &[u8]) -> Result<(), GelfError> {
        let mut link = self.link.lock();
        self.ensure_open(&mut link)?;
        let err = match self.attempt(&mut link, frame) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        debug!(
            "TcpWriter write to {}:{} failed: {err}",
            self.config.transport.host, self.config.transport.port
        );
        self.drop_connection(&mut link, ConnectionState::Reconnecting);
        self.reconnect_and_resend(&mut link, frame, err)
    }

    fn reconnect_and_resend(
        &self,
        link: &mut Link,
        frame: &[u8],
        mut last_err: io::Error,
    ) -> Result<(), GelfError> {
        let policy = &self.config.reconnect;
        for attempt in 1..=policy.max_reconnect {
            self.pause(policy.reconnect_delay)?;
            self.ensure_open(link)?;
            debug!(
                "TcpWriter reconnect attempt {attempt}/{} to {}:{}",
                policy.max_reconnect, self.config.transport.host, self.config.transport.port
            );
            match self.attempt(link, frame) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    self.drop_connection(link, ConnectionState::Reconnecting);
                    last_err = err;
                }
            }
        }
        self.ensure_open(link)?;
        self.drop_connection(link, ConnectionState::Disconnected);
        Err(GelfError::Connection {
            attempts: policy.max_reconnect,
            source: last_err,
        })
    }

    /// Write on the current connection, dialing first when there is none.
    fn attempt(&self, link: &mut Link, frame: &[u8]) -> io::Result<()> {
        if let Some(conn) = link.conn.as_mut() {
            return conn.write_frame(frame);
        }
        let conn = self.dial()?;
        self.install(link, conn).write_frame(frame)
    }

    fn dial(&self) -> io::Result<ActiveConnection> {
        let conn = connect_transport(&self.config.transport, self.config.connect_timeout)?;
        conn.set_write_timeout(self.config.write_timeout)?;
        Ok(conn)
    }

    fn install<'a>(&self, link: &'a mut Link, conn: ActiveConnection) -> &'a mut ActiveConnection {
        {
            let mut handle = self.shutdown_handle.lock();
            if self.closed.load(Ordering::SeqCst) {
                conn.shutdown();
            } else {
                *handle = conn.shutdown_handle().ok();
            }
        }
        self.transition(link, ConnectionState::Connected);
        link.conn.insert(conn)
    }

    fn drop_connection(&self, link: &mut Link, next: ConnectionState) {
        link.conn = None;
        self.shutdown_handle.lock().take();
        self.transition(link, next);
    }

    fn transition(&self, link: &mut Link, next: ConnectionState) {
        link.state = next;
        self.observed.store(next.as_u8(), Ordering::Release);
    }

    /// Wait out the reconnect delay, returning early if the writer closes.
    fn pause(&self, delay: Duration) -> Result<(), GelfError> {
        match self.close_signal.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Err(GelfError::Closed),
        }
    }

    fn ensure_open(&self, link: &mut Link) -> Result<(), GelfError> {
        if !self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if link.state != ConnectionState::Closed {
            self.drop_connection(link, ConnectionState::Closed);
        }
        Err(GelfError::Closed)
    }
}

impl GelfWriter for TcpWriter {
    fn origin(&self) -> &Origin {
        &self.config.origin
    }

    fn write_message(&self, message: &Message) -> Result<(), GelfError> {
        let encoded = encode(message)?;
        self.send_encoded(&encoded)
    }

    /// Close the writer. An in-flight write is interrupted and fails with
    /// [`GelfError::Closed`].
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_trigger.lock().take();
        if let Some(stream) = self.shutdown_handle.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        let mut link = self.link.lock();
        if link.state != ConnectionState::Closed {
            self.drop_connection(&mut link, ConnectionState::Closed);
        }
    }
}

impl_io_write!(TcpWriter);

impl Drop for TcpWriter {
    fn drop(&mut self) {
        GelfWriter::close(self);
    }
}

impl std::fmt::Debug for TcpWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpWriter")
            .field("transport", &self.config.transport)
            .field("state", &self.state())
            .finish()
    }
}
