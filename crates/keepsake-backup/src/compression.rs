//! Compression and checksum helpers for artifacts.

use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::{self, Write};

pub use keepsake_core::config::DEFAULT_COMPRESSION_LEVEL;

/// Statistics about a written artifact.
#[derive(Debug, Clone)]
pub struct CompressionStats {
    /// Uncompressed payload size in bytes
    pub original_size: u64,

    /// Compressed artifact size in bytes
    pub compressed_size: u64,

    /// Compression ratio (compressed / original)
    pub compression_ratio: f64,

    /// SHA256 checksum of the compressed artifact
    pub checksum: String,
}

impl CompressionStats {
    pub fn new(original_size: u64, compressed_size: u64, checksum: String) -> Self {
        let compression_ratio = if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            0.0
        };

        Self {
            original_size,
            compressed_size,
            compression_ratio,
            checksum,
        }
    }

    /// Returns compression percentage saved.
    pub fn compression_percentage(&self) -> u8 {
        ((1.0 - self.compression_ratio).max(0.0) * 100.0) as u8
    }
}

/// Gzip level, clamped to 1-9.
pub fn gzip_level(level: u32) -> Compression {
    Compression::new(level.clamp(1, 9))
}

/// Hex SHA256 of a byte slice.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Writer that calculates SHA256 checksum while writing.
pub(crate) struct ChecksumWriter<W: Write> {
    writer: W,
    hasher: Sha256,
    bytes_written: u64,
}

impl<W: Write> ChecksumWriter<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: Sha256::new(),
            bytes_written: 0,
        }
    }

    /// Flush and hand back the inner writer with the byte count and digest.
    pub(crate) fn finish(mut self) -> io::Result<(W, u64, String)> {
        self.writer.flush()?;
        let checksum = format!("{:x}", self.hasher.finalize());
        Ok((self.writer, self.bytes_written, checksum))
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
