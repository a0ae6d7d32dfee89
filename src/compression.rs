//! Payload compression for the UDP transport.
//!
//! Writers pick a [`CompressionType`] up front. Readers never trust
//! configuration: [`CompressionType::detect`] inspects the leading bytes of
//! each payload instead.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use flate2::{
    Compression,
    read::{GzDecoder, ZlibDecoder},
    write::{GzEncoder, ZlibEncoder},
};

use crate::error::{DecodingError, GelfError};

/// Leading bytes of a gzip stream.
pub const MAGIC_GZIP: [u8; 2] = [0x1f, 0x8b];
/// Leading byte of a zlib stream.
pub const MAGIC_ZLIB: u8 = 0x78;

/// Compression level used when none is configured.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
/// Highest level accepted by the encoder.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Compression applied to an encoded payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionType {
    None,
    #[default]
    Gzip,
    Zlib,
}

impl CompressionType {
    /// Classify a payload by its leading bytes.
    pub fn detect(payload: &[u8]) -> Self {
        if payload.starts_with(&MAGIC_GZIP) {
            Self::Gzip
        } else if payload.first() == Some(&MAGIC_ZLIB) {
            Self::Zlib
        } else {
            Self::None
        }
    }

    /// Compress `payload` at `level` (clamped to 0..=9).
    pub fn compress(self, payload: &[u8], level: u32) -> io::Result<Vec<u8>> {
        let level = Compression::new(level.min(MAX_COMPRESSION_LEVEL));
        match self {
            Self::None => Ok(payload.to_vec()),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::with_capacity(payload.len() / 2), level);
                encoder.write_all(payload)?;
                encoder.finish()
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2), level);
                encoder.write_all(payload)?;
                encoder.finish()
            }
        }
    }

    /// Undo [`compress`](Self::compress) for this mode.
    pub fn decompress(self, payload: &[u8]) -> Result<Vec<u8>, GelfError> {
        self.decompress_limited(payload, usize::MAX)
    }

    /// Like [`decompress`](Self::decompress), but fail with
    /// [`DecodingError::PayloadTooLarge`] once the output passes `limit` bytes.
    pub fn decompress_limited(self, payload: &[u8], limit: usize) -> Result<Vec<u8>, GelfError> {
        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        let mut out = Vec::with_capacity(payload.len().saturating_mul(2).min(limit));
        let result = match self {
            Self::None => Read::take(payload, cap).read_to_end(&mut out),
            Self::Gzip => GzDecoder::new(payload).take(cap).read_to_end(&mut out),
            Self::Zlib => ZlibDecoder::new(payload).take(cap).read_to_end(&mut out),
        };
        result.map_err(DecodingError::Decompression)?;
        if out.len() > limit {
            return Err(DecodingError::PayloadTooLarge { limit }.into());
        }
        Ok(out)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
        }
    }
}

/// Decompress a payload using the format named by its leading bytes.
pub fn decompress_detected(payload: &[u8]) -> Result<Vec<u8>, GelfError> {
    decompress_detected_limited(payload, usize::MAX)
}

/// Detect and decompress, refusing output larger than `limit` bytes.
pub fn decompress_detected_limited(payload: &[u8], limit: usize) -> Result<Vec<u8>, GelfError> {
    CompressionType::detect(payload).decompress_limited(payload, limit)
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            _ => Err(()),
        }
    }
}
