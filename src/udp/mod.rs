//! GELF over UDP.
//!
//! [`UdpWriter`] encodes a [`Message`](crate::Message), compresses it, and
//! either sends it as one datagram or splits it into headered chunks.
//! [`UdpReader`] routes incoming datagrams by their magic bytes, rebuilds
//! chunked payloads through a [`Defragmenter`], detects the compression from
//! the payload itself, and decodes the result.

pub mod chunk;
mod config;
pub mod defrag;
mod message_id;
mod reader;
mod writer;


pub use chunk::{CHUNK_DATA_LEN, CHUNK_HEADER_LEN, CHUNK_SIZE, MAX_CHUNKS, MessageId, chunk_count};
pub use config::{
    DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_UDP_PORT, MAX_DATAGRAM_SIZE, UdpReaderConfig, UdpWriterConfig,
};
pub use defrag::{Defragmenter, ReassemblyConfig};
pub use message_id::{MessageIdSource, SequentialIdSource};
pub use reader::UdpReader;
pub use writer::UdpWriter;
