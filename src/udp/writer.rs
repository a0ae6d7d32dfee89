//! Best-effort UDP writer.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
};

use parking_lot::{Mutex, RwLock};

use crate::{
    error::GelfError,
    message::{Message, Origin, encode},
    writer::{GelfWriter, impl_io_write},
};

use super::{
    chunk::{MessageId, chunk_count, frame_datagrams},
    config::UdpWriterConfig,
    message_id::{MessageIdSource, SequentialIdSource},
};

/// Writer sending compressed, chunked GELF datagrams.
///
/// Every chunk is a separate `send`; nothing is acknowledged or retried, so a
/// lost chunk only shows up as an incomplete message on the collector.
pub struct UdpWriter {
    socket: RwLock<Option<UdpSocket>>,
    peer: SocketAddr,
    ids: Mutex<Box<dyn MessageIdSource>>,
    config: UdpWriterConfig,
}

impl UdpWriter {
    /// Bind an ephemeral socket and point it at the configured collector.
    pub fn new(config: UdpWriterConfig) -> Result<Self, GelfError> {
        Self::with_id_source(config, SequentialIdSource::random())
    }

    /// Like [`new`](Self::new) but with a caller-supplied id source.
    pub fn with_id_source(
        config: UdpWriterConfig,
        ids: impl MessageIdSource + 'static,
    ) -> Result<Self, GelfError> {
        let peer = resolve(&config.host, config.port)?;
        let bind_addr: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(peer)?;
        Ok(Self {
            socket: RwLock::new(Some(socket)),
            peer,
            ids: Mutex::new(Box::new(ids)),
            config,
        })
    }

    /// Address of the collector datagrams are sent to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GelfError> {
        let guard = self.socket.read();
        let socket = guard.as_ref().ok_or(GelfError::Closed)?;
        Ok(socket.local_addr()?)
    }

    pub fn config(&self) -> &UdpWriterConfig {
        &self.config
    }

    /// Send an already compressed payload, chunking it when necessary.
    ///
    /// Returns the number of datagrams sent.
    pub fn send_payload(&self, payload: &[u8]) -> Result<usize, GelfError> {
        let guard = self.socket.read();
        let socket = guard.as_ref().ok_or(GelfError::Closed)?;
        let id = self.id_for(payload.len());
        let datagrams = frame_datagrams(payload, id)?;
        for datagram in &datagrams {
            socket.send(datagram)?;
        }
        Ok(datagrams.len())
    }

    fn id_for(&self, len: usize) -> MessageId {
        if chunk_count(len) > 1 {
            self.ids.lock().next_id()
        } else {
            MessageId::default()
        }
    }
}

impl GelfWriter for UdpWriter {
    fn origin(&self) -> &Origin {
        &self.config.origin
    }

    fn write_message(&self, message: &Message) -> Result<(), GelfError> {
        let encoded = encode(message)?;
        let payload = self
            .config
            .compression
            .compress(&encoded, self.config.compression_level)?;
        self.send_payload(&payload)?;
        Ok(())
    }

    fn close(&self) {
        self.socket.write().take();
    }
}

impl_io_write!(UdpWriter);

impl std::fmt::Debug for UdpWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpWriter")
            .field("peer", &self.peer)
            .field("compression", &self.config.compression)
            .finish()
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no addresses found for {host}:{port}"),
        )
    })
}
