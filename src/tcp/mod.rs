//! GELF over TCP.
//!
//! Messages travel as uncompressed JSON, each followed by a single `0x00`
//! byte. [`TcpWriter`] keeps one connection open and redials on failure;
//! [`TcpReader`] splits the stream back into frames with a [`FrameReader`].

mod config;
mod reader;
mod transport;
mod writer;

#[cfg(test)]
mod tests;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_RECONNECT,
    DEFAULT_RECONNECT_DELAY, DEFAULT_TCP_PORT, ReconnectPolicy, TcpReaderConfig, TcpWriterConfig,
};
pub use reader::{FrameReader, TcpReader};
pub use transport::{ActiveConnection, TcpTransport, TlsOptions, connect_transport};
pub use writer::{ConnectionState, FRAME_DELIMITER, TcpWriter};
