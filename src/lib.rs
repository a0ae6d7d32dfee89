//! GELF (Graylog Extended Log Format) transport.
//!
//! Messages are encoded as JSON and carried either over UDP, compressed and
//! split into chunks when they outgrow one datagram, or over TCP as
//! null-terminated frames on a connection that redials after failures.
//!
//! ```no_run
//! use gelf_transport::{GelfWriter, Level, Message, UdpWriterBuilder, WriterBuilder};
//!
//! let writer = UdpWriterBuilder::new()
//!     .with_destination("graylog.internal", 12201)
//!     .build()?;
//! writer.write(b"disk almost full\n/var is at 97%")?;
//! writer.write_message(
//!     &Message::new("web-1", "checkout failed")
//!         .with_level(Level::Error)
//!         .with_extra("_order_id", 4711_i64),
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builders;
pub mod compression;
pub mod error;
pub mod file_config;
pub mod level;
pub mod message;
pub mod tcp;
pub mod udp;
mod writer;

pub use builders::{BuildError, TcpWriterBuilder, UdpWriterBuilder, WriterBuilder};
pub use compression::CompressionType;
pub use error::{DecodingError, EncodingError, GelfError, ProtocolError};
pub use file_config::{
    ConfigError, tcp_builder_from_ini, tcp_builder_from_ini_str, udp_builder_from_ini,
    udp_builder_from_ini_str,
};
pub use level::Level;
pub use message::{ExtraValue, GELF_VERSION, Message, Origin, decode, encode};
pub use tcp::{ConnectionState, FrameReader, TcpReader, TcpWriter};
pub use udp::{Defragmenter, UdpReader, UdpWriter};
pub use writer::GelfWriter;
