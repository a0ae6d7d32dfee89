//! Configuration structures consumed by the TCP writer and reader.
//!
//! `TcpWriterBuilder` constructs these values before passing them to
//! [`TcpWriter`](super::TcpWriter) for runtime use.

use std::time::Duration;

use crate::message::Origin;

use super::transport::TcpTransport;

/// Default GELF TCP port.
pub const DEFAULT_TCP_PORT: u16 = 12201;
/// Default connection timeout applied when dialing.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of redials after a failed write.
pub const DEFAULT_MAX_RECONNECT: u32 = 3;
/// Default pause before each redial.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Default limit on a single frame accepted by the reader.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20; // 1 MiB

/// Redial budget applied after a failed write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Redials attempted before the write gives up.
    pub max_reconnect: u32,
    /// Fixed pause before every redial.
    pub reconnect_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_reconnect: DEFAULT_MAX_RECONNECT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Configuration object describing how to construct a [`TcpWriter`](super::TcpWriter).
#[derive(Clone, Debug)]
pub struct TcpWriterConfig {
    pub transport: TcpTransport,
    pub connect_timeout: Duration,
    /// Socket write timeout; `None` leaves writes blocking.
    pub write_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
    pub origin: Origin,
}

/// Provide defaults that favour local development whilst encouraging
/// production callers to override the transport via the builder APIs.
impl Default for TcpWriterConfig {
    fn default() -> Self {
        Self {
            transport: TcpTransport {
                host: "localhost".into(),
                port: DEFAULT_TCP_PORT,
                tls: None,
            },
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: None,
            reconnect: ReconnectPolicy::default(),
            origin: Origin::default(),
        }
    }
}

impl TcpWriterConfig {
    /// Override the transport configuration.
    pub fn with_transport(mut self, transport: TcpTransport) -> Self {
        self.transport = transport;
        self
    }
}

/// Configuration for [`TcpReader`](super::TcpReader).
#[derive(Clone, Debug)]
pub struct TcpReaderConfig {
    pub max_frame_size: usize,
    /// Read timeout applied to accepted connections.
    pub read_timeout: Option<Duration>,
}

impl Default for TcpReaderConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: None,
        }
    }
}
