//! Page codec for the persistent engine
//!
//! Pages are optionally LZ4/ZSTD compressed. The codec is recorded in every
//! page header, so pages written with one codec stay readable after the
//! configured codec changes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Compression algorithm for persisted pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCodec {
    /// Raw bincode payload (default)
    #[default]
    None,
    /// LZ4 - Fast compression (requires the `compression` feature)
    Lz4,
    /// ZSTD - Better ratio, slower (requires the `compression` feature)
    Zstd,
}

impl PageCodec {
    /// Get algorithm name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// Header byte identifying this codec
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4 => 1,
            Self::Zstd => 2,
        }
    }

    /// Codec for a header byte
    ///
    /// # Errors
    /// Returns error for an unknown tag (corrupt page)
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Zstd),
            other => Err(Error::StorageError(format!("unknown page codec tag {other}"))),
        }
    }

    /// Encode page payload using this algorithm
    ///
    /// # Errors
    /// Returns error if compression fails or the `compression` feature is disabled
    pub fn encode(self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Self::None => Ok(data.to_vec()),
            #[cfg(feature = "compression")]
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            #[cfg(feature = "compression")]
            Self::Zstd => zstd::encode_all(data, 3)
                .map_err(|e| Error::StorageError(format!("ZSTD compression failed: {e}"))),
            #[cfg(not(feature = "compression"))]
            Self::Lz4 | Self::Zstd => Err(self.unsupported()),
        }
    }

    /// Decode page payload using this algorithm
    ///
    /// # Errors
    /// Returns error if decompression fails (e.g., corrupted data)
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Self::None => Ok(data.to_vec()),
            #[cfg(feature = "compression")]
            Self::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| Error::StorageError(format!("LZ4 decompression failed: {e}"))),
            #[cfg(feature = "compression")]
            Self::Zstd => zstd::decode_all(data)
                .map_err(|e| Error::StorageError(format!("ZSTD decompression failed: {e}"))),
            #[cfg(not(feature = "compression"))]
            Self::Lz4 | Self::Zstd => Err(self.unsupported()),
        }
    }

    #[cfg(not(feature = "compression"))]
    fn unsupported(self) -> Error {
        Error::StorageError(format!(
            "page codec {} requires the `compression` feature",
            self.as_str()
        ))
    }
}
