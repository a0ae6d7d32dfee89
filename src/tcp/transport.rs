//! Transport primitives for the TCP writer.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

/// TCP destination with optional TLS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpTransport {
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port number.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsOptions>,
}

impl TcpTransport {
    /// Plain TCP destination.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
        }
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

/// TLS connection options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Live outbound stream.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ActiveConnection {
    fn tcp(&self) -> &TcpStream {
        match self {
            ActiveConnection::PlainTcp(stream) => stream,
            ActiveConnection::Tls(stream) => stream.get_ref(),
        }
    }

    /// Update the write timeout for the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.tcp().set_write_timeout(timeout)
    }

    /// Second handle on the raw socket, used to shut it down from another
    /// thread while a write is blocked on it.
    pub fn shutdown_handle(&self) -> io::Result<TcpStream> {
        self.tcp().try_clone()
    }

    /// Write a complete frame and flush it.
    pub fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
            ActiveConnection::Tls(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// Close both directions of the socket.
    pub fn shutdown(&self) {
        let _ = self.tcp().shutdown(Shutdown::Both);
    }
}

fn connect_tcp(config: &TcpTransport, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = config.socket_addrs()?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("unable to connect to {}:{}", config.host, config.port),
        )
    }))
}

/// Establish a connection using the provided transport definition.
pub fn connect_transport(
    transport: &TcpTransport,
    connect_timeout: Duration,
) -> io::Result<ActiveConnection> {
    let stream = connect_tcp(transport, connect_timeout)?;
    let Some(tls) = &transport.tls else {
        return Ok(ActiveConnection::PlainTcp(stream));
    };
    let connector = tls.connector()?;
    stream.set_read_timeout(Some(connect_timeout))?;
    stream.set_write_timeout(Some(connect_timeout))?;
    let stream = connector
        .connect(&tls.domain, stream)
        .map_err(io::Error::other)?;
    let tcp_ref = stream.get_ref();
    tcp_ref.set_read_timeout(None)?;
    tcp_ref.set_write_timeout(None)?;
    Ok(ActiveConnection::Tls(Box::new(stream)))
}
