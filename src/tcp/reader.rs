//! Reader side of GELF over TCP.

use std::{
    io::{self, Read},
    net::{
        IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs,
    },
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use log::debug;
use parking_lot::Mutex;

use crate::{
    error::{GelfError, ProtocolError},
    message::{Message, decode},
};

use super::{config::TcpReaderConfig, writer::FRAME_DELIMITER};

const READ_CHUNK: usize = 8 * 1024;
const WAKE_TIMEOUT: Duration = Duration::from_millis(200);

/// Splits a byte stream into null-terminated frames.
///
/// Partial frames are buffered across reads. A frame that grows past
/// `max_frame_size` is reported once and the remainder of it is dropped up to
/// the next delimiter. Empty frames are skipped.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a delimiter.
    scanned: usize,
    max_frame_size: usize,
    discarding: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            scanned: 0,
            max_frame_size,
            discarding: false,
        }
    }

    /// Next complete frame without its delimiter, or `None` at a clean end of
    /// stream.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, GelfError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(pos) = self.find_delimiter() {
                self.scanned = 0;
                let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
                frame.pop();
                if std::mem::take(&mut self.discarding) || frame.is_empty() {
                    continue;
                }
                if frame.len() > self.max_frame_size {
                    return Err(self.too_large());
                }
                return Ok(Some(frame));
            }
            if self.buf.len() > self.max_frame_size {
                self.buf.clear();
                self.scanned = 0;
                if !self.discarding {
                    self.discarding = true;
                    return Err(self.too_large());
                }
            }
            let len = match self.inner.read(&mut chunk) {
                Ok(len) => len,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if len == 0 {
                return self.finish();
            }
            self.buf.extend_from_slice(&chunk[..len]);
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn find_delimiter(&mut self) -> Option<usize> {
        let start = self.scanned;
        self.scanned = self.buf.len();
        self.buf[start..]
            .iter()
            .position(|b| *b == FRAME_DELIMITER)
            .map(|pos| start + pos)
    }

    fn finish(&mut self) -> Result<Option<Vec<u8>>, GelfError> {
        let pending = self.buf.len();
        self.buf.clear();
        self.scanned = 0;
        if pending == 0 || std::mem::take(&mut self.discarding) {
            Ok(None)
        } else {
            Err(ProtocolError::TruncatedFrame { len: pending }.into())
        }
    }

    fn too_large(&self) -> GelfError {
        ProtocolError::FrameTooLarge {
            limit: self.max_frame_size,
        }
        .into()
    }
}

/// Accepts writers one at a time and yields the messages they send.
///
/// When the current peer hangs up the next `read_message` accepts the next
/// connection, so a reconnecting writer is picked up without intervention.
pub struct TcpReader {
    listener: TcpListener,
    config: TcpReaderConfig,
    current: Mutex<Option<FrameReader<TcpStream>>>,
    peer: Mutex<Option<TcpStream>>,
    closed: AtomicBool,
}

impl TcpReader {
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, GelfError> {
        Self::bind_with_config(addr, TcpReaderConfig::default())
    }

    pub fn bind_with_config(
        addr: impl ToSocketAddrs,
        config: TcpReaderConfig,
    ) -> Result<Self, GelfError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            config,
            current: Mutex::new(None),
            peer: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GelfError> {
        Ok(self.listener.local_addr()?)
    }

    /// Block until the next message arrives, accepting a connection first if
    /// none is active.
    pub fn read_message(&self) -> Result<Message, GelfError> {
        let frame = self.read_frame()?;
        decode(&frame)
    }

    /// Read the next message's text into `buf`, truncating to its length.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, GelfError> {
        let message = self.read_message()?;
        let text = message.text().as_bytes();
        let len = text.len().min(buf.len());
        buf[..len].copy_from_slice(&text[..len]);
        Ok(len)
    }

    /// Hang up on the current peer. The next read accepts a new connection.
    pub fn disconnect(&self) {
        if let Some(stream) = self.peer.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.current.lock().take();
    }

    /// Mark the reader closed and hang up on the current peer. A call blocked
    /// in `accept` is woken and fails with [`GelfError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(stream) = self.peer.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.wake_accept();
    }

    /// Dial our own listener so a blocked `accept` sees the closed flag.
    fn wake_accept(&self) {
        let Ok(mut addr) = self.listener.local_addr() else {
            return;
        };
        if addr.ip().is_unspecified() {
            addr.set_ip(match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        if let Err(err) = TcpStream::connect_timeout(&addr, WAKE_TIMEOUT) {
            debug!("TcpReader could not wake its listener: {err}");
        }
    }

    fn read_frame(&self) -> Result<Vec<u8>, GelfError> {
        let mut current = self.current.lock();
        loop {
            self.ensure_open()?;
            if current.is_none() {
                *current = Some(self.accept()?);
            }
            let Some(frames) = current.as_mut() else {
                continue;
            };
            match frames.next_frame() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {
                    debug!("TcpReader peer closed the connection");
                    self.peer.lock().take();
                    *current = None;
                }
                Err(err) => {
                    if matches!(err, GelfError::Protocol(ProtocolError::TruncatedFrame { .. })) {
                        self.peer.lock().take();
                        *current = None;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn accept(&self) -> Result<FrameReader<TcpStream>, GelfError> {
        let (stream, addr) = self.listener.accept()?;
        self.ensure_open()?;
        debug!("TcpReader accepted connection from {addr}");
        stream.set_read_timeout(self.config.read_timeout)?;
        *self.peer.lock() = stream.try_clone().ok();
        Ok(FrameReader::new(stream, self.config.max_frame_size))
    }

    fn ensure_open(&self) -> Result<(), GelfError> {
        if self.closed.load(Ordering::Acquire) {
            Err(GelfError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for TcpReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpReader")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("config", &self.config)
            .finish()
    }
}
