//! GELF chunk framing.
//!
//! A payload that fits in [`CHUNK_SIZE`] bytes travels as a single bare
//! datagram. Anything larger is cut into slices of [`CHUNK_DATA_LEN`] bytes,
//! each prefixed with a 12-byte header:
//!
//! ```text
//! 0      2              10    11      12
//! +------+--------------+-----+-------+-------------+
//! | 1e0f | message id   | seq | total | slice ...   |
//! +------+--------------+-----+-------+-------------+
//! ```

use crate::error::ProtocolError;

/// Largest datagram the writer emits. Kept below common MTUs.
pub const CHUNK_SIZE: usize = 1420;
/// Bytes of chunk header preceding every slice.
pub const CHUNK_HEADER_LEN: usize = 12;
/// Payload bytes carried per chunk.
pub const CHUNK_DATA_LEN: usize = CHUNK_SIZE - CHUNK_HEADER_LEN;
/// Protocol limit on chunks per message.
pub const MAX_CHUNKS: usize = 128;
/// Leading bytes of a chunk datagram.
pub const MAGIC_CHUNKED: [u8; 2] = [0x1e, 0x0f];

/// Identifier shared by all chunks of one message.
pub type MessageId = [u8; 8];

/// Number of datagrams needed for a payload of `len` bytes.
pub fn chunk_count(len: usize) -> usize {
    if len <= CHUNK_SIZE {
        1
    } else {
        len.div_ceil(CHUNK_DATA_LEN)
    }
}

/// Whether a datagram starts with the chunk magic.
pub fn is_chunked(datagram: &[u8]) -> bool {
    datagram.starts_with(&MAGIC_CHUNKED)
}

/// Parsed chunk header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: MessageId,
    pub sequence: u8,
    pub total: u8,
}

impl ChunkHeader {
    /// Parse the header of a chunk datagram, returning it with the slice.
    ///
    /// The caller must already have checked the magic with [`is_chunked`].
    pub fn parse(datagram: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        if datagram.len() < CHUNK_HEADER_LEN {
            return Err(ProtocolError::MalformedHeader {
                len: datagram.len(),
            });
        }
        let (header, slice) = datagram.split_at(CHUNK_HEADER_LEN);
        let mut id = [0u8; 8];
        id.copy_from_slice(&header[2..10]);
        let sequence = header[10];
        let total = header[11];
        if total == 0 || usize::from(total) > MAX_CHUNKS {
            return Err(ProtocolError::InvalidTotal { total });
        }
        if sequence >= total {
            return Err(ProtocolError::SequenceOutOfRange { sequence, total });
        }
        Ok((
            Self {
                id,
                sequence,
                total,
            },
            slice,
        ))
    }

    fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&MAGIC_CHUNKED);
        buf.extend_from_slice(&self.id);
        buf.push(self.sequence);
        buf.push(self.total);
    }
}

/// Split a payload into ready-to-send datagrams.
///
/// Returns the payload untouched as the only datagram when it fits in one.
pub fn frame_datagrams(payload: &[u8], id: MessageId) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let count = chunk_count(payload.len());
    if count == 1 {
        return Ok(vec![payload.to_vec()]);
    }
    let total = u8::try_from(count)
        .ok()
        .filter(|_| count <= MAX_CHUNKS)
        .ok_or(ProtocolError::TooManyChunks {
            count,
            max: MAX_CHUNKS,
        })?;
    Ok(payload
        .chunks(CHUNK_DATA_LEN)
        .zip(0u8..)
        .map(|(slice, sequence)| {
            let mut datagram = Vec::with_capacity(CHUNK_HEADER_LEN + slice.len());
            ChunkHeader {
                id,
                sequence,
                total,
            }
            .write_into(&mut datagram);
            datagram.extend_from_slice(slice);
            datagram
        })
        .collect())
}
