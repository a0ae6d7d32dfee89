//! UDP reader that reassembles and decodes GELF datagrams.

use std::{
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    compression::decompress_detected_limited,
    error::GelfError,
    message::{Message, decode},
};

use super::{
    config::{MAX_DATAGRAM_SIZE, UdpReaderConfig},
    defrag::Defragmenter,
};

/// Receives datagrams on a bound socket and yields complete messages.
///
/// Chunks are merged by an internal [`Defragmenter`]; partial messages that
/// never complete are evicted by its reaper.
pub struct UdpReader {
    socket: UdpSocket,
    defrag: Defragmenter,
    max_payload_size: usize,
    closed: AtomicBool,
}

impl UdpReader {
    /// Bind to `addr` with default reassembly settings.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, GelfError> {
        Self::bind_with_config(addr, UdpReaderConfig::default())
    }

    pub fn bind_with_config(
        addr: impl ToSocketAddrs,
        config: UdpReaderConfig,
    ) -> Result<Self, GelfError> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self {
            socket,
            defrag: Defragmenter::new(config.reassembly),
            max_payload_size: config.max_payload_size,
            closed: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GelfError> {
        Ok(self.socket.local_addr()?)
    }

    /// Apply a receive timeout to the socket; `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), GelfError> {
        Ok(self.socket.set_read_timeout(timeout)?)
    }

    /// Block until a complete payload arrives and return it decompressed.
    pub fn read_payload(&self) -> Result<Vec<u8>, GelfError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            self.ensure_open()?;
            let received = self.socket.recv_from(&mut buf);
            self.ensure_open()?;
            let (len, _) = received?;
            if let Some(payload) = self.defrag.accept(&buf[..len])? {
                return decompress_detected_limited(&payload, self.max_payload_size);
            }
        }
    }

    /// Block until a complete message arrives.
    pub fn read_message(&self) -> Result<Message, GelfError> {
        let payload = self.read_payload()?;
        decode(&payload)
    }

    /// Read the next message's text into `buf`.
    ///
    /// Copies the full message when present, otherwise the short one, and
    /// truncates to the length of `buf`.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, GelfError> {
        let message = self.read_message()?;
        let text = message.text().as_bytes();
        let len = text.len().min(buf.len());
        buf[..len].copy_from_slice(&text[..len]);
        Ok(len)
    }

    /// Partial messages currently awaiting chunks.
    pub fn pending_reassemblies(&self) -> usize {
        self.defrag.pending()
    }

    /// Mark the reader closed. A call already blocked in `recv` fails with
    /// [`GelfError::Closed`] when the next datagram arrives or its read
    /// timeout fires.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<(), GelfError> {
        if self.closed.load(Ordering::Acquire) {
            Err(GelfError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for UdpReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpReader")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("defrag", &self.defrag)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}
