//! CRC32 checksums for checkpoint frames
//!
//! The checksum covers the serialized payload bytes of a frame and nothing
//! else. Uses CRC32 (IEEE polynomial).

use std::io::{self, Read};

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Reader adapter that checksums every byte it hands out.
///
/// Lets a frame be decoded straight from the stream while the checksum is
/// accumulated, so variable-length payloads need no second pass.
pub struct ChecksumReader<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    hasher: Hasher,
    consumed: u64,
}

impl<'a, R: Read + ?Sized> ChecksumReader<'a, R> {
    pub fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            consumed: 0,
        }
    }

    /// Bytes read through this adapter so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Checksum of everything read so far.
    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

impl<R: Read + ?Sized> Read for ChecksumReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.consumed += n as u64;
        Ok(n)
    }
}
