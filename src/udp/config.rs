//! Configuration consumed by [`UdpWriter`](super::UdpWriter) and
//! [`UdpReader`](super::UdpReader).
//!
//! `UdpWriterBuilder` validates user input before producing these values.

use crate::{
    compression::{CompressionType, DEFAULT_COMPRESSION_LEVEL},
    message::Origin,
};

use super::defrag::ReassemblyConfig;

/// Default GELF UDP port.
pub const DEFAULT_UDP_PORT: u16 = 12201;
/// Receive buffer large enough for any UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;
/// Largest decompressed payload a reader accepts by default.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1 << 20;

/// Configuration describing how to construct a [`UdpWriter`](super::UdpWriter).
#[derive(Clone, Debug)]
pub struct UdpWriterConfig {
    /// Collector hostname or address.
    pub host: String,
    pub port: u16,
    pub compression: CompressionType,
    /// Level 0..=9 handed to the compressor.
    pub compression_level: u32,
    pub origin: Origin,
}

impl Default for UdpWriterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_UDP_PORT,
            compression: CompressionType::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            origin: Origin::default(),
        }
    }
}

impl UdpWriterConfig {
    /// Target the collector at `host:port`.
    pub fn with_destination(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }
}

/// Configuration for [`UdpReader`](super::UdpReader).
#[derive(Clone, Debug)]
pub struct UdpReaderConfig {
    pub reassembly: ReassemblyConfig,
    /// Ceiling on a payload's size after decompression.
    pub max_payload_size: usize,
}

impl Default for UdpReaderConfig {
    fn default() -> Self {
        Self {
            reassembly: ReassemblyConfig::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}
