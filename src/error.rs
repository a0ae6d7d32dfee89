//! Error types surfaced by the GELF transports.
//!
//! Every fallible operation in the crate returns [`GelfError`]. The nested
//! kinds split failures by the layer that detected them so callers can match
//! on codec, framing, and connection problems separately.

use std::io;

use thiserror::Error;

/// Top-level error returned by writers, readers, and the codec.
#[derive(Debug, Error)]
pub enum GelfError {
    /// A message could not be turned into JSON.
    #[error("failed to encode GELF message: {0}")]
    Encoding(#[from] EncodingError),
    /// Received bytes could not be turned into a message.
    #[error("failed to decode GELF message: {0}")]
    Decoding(#[from] DecodingError),
    /// The wire framing was violated.
    #[error("GELF protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The reconnect budget ran out before the frame could be written.
    #[error("connection lost after {attempts} reconnect attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: io::Error,
    },
    /// The transport was closed explicitly.
    #[error("transport is closed")]
    Closed,
    /// Underlying socket error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures while encoding a [`Message`](crate::Message).
#[derive(Debug, Error)]
pub enum EncodingError {
    /// An additional field tried to overwrite a reserved field with a
    /// different value.
    #[error("additional field `{key}` conflicts with the reserved field of the same name")]
    ReservedKeyConflict { key: String },
    /// `raw_extra` was not valid JSON.
    #[error("raw extra fields are not valid JSON: {0}")]
    InvalidRawExtra(#[source] serde_json::Error),
    /// `raw_extra` parsed but was not a JSON object.
    #[error("raw extra fields must be a JSON object")]
    RawExtraNotObject,
    /// JSON has no representation for NaN or infinity.
    #[error("additional field `{key}` holds a non-finite number")]
    NonFiniteNumber { key: String },
    /// The reserved fields could not be serialised.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures while decoding bytes into a [`Message`](crate::Message).
#[derive(Debug, Error)]
pub enum DecodingError {
    /// The payload was not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload was JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,
    /// A required field was absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// A reserved field carried the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    /// The gzip or zlib stream was corrupt.
    #[error("failed to decompress payload: {0}")]
    Decompression(#[source] io::Error),
    /// The payload inflated past the configured ceiling.
    #[error("decompressed payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

/// Violations of the UDP chunk or TCP frame format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload would need more than 128 chunks.
    #[error("payload needs {count} chunks; at most {max} are allowed")]
    TooManyChunks { count: usize, max: usize },
    /// A chunk-magic datagram was shorter than the header.
    #[error("chunk datagram of {len} bytes is shorter than the chunk header")]
    MalformedHeader { len: usize },
    /// The declared chunk total was zero or above 128.
    #[error("chunk total {total} is outside 1..=128")]
    InvalidTotal { total: u8 },
    /// The sequence index did not fit the declared total.
    #[error("chunk sequence {sequence} is out of range for a total of {total}")]
    SequenceOutOfRange { sequence: u8, total: u8 },
    /// Two chunks of one message disagreed on the total.
    #[error("chunk declares total {received} but message already has total {existing}")]
    ConflictingTotal { existing: u8, received: u8 },
    /// Too many partial messages are being reassembled.
    #[error("refusing new chunked message; {limit} reassemblies already pending")]
    TooManyPending { limit: usize },
    /// A TCP frame exceeded the configured limit.
    #[error("frame exceeds the maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },
    /// The stream ended in the middle of a frame.
    #[error("stream ended with {len} bytes of an unterminated frame")]
    TruncatedFrame { len: usize },
}

impl From<GelfError> for io::Error {
    fn from(err: GelfError) -> Self {
        match err {
            GelfError::Io(err) => err,
            GelfError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
            GelfError::Connection { .. } => io::Error::new(io::ErrorKind::BrokenPipe, err),
            GelfError::Encoding(_) | GelfError::Decoding(_) | GelfError::Protocol(_) => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
        }
    }
}
