//! Positioned little-endian primitives over a seekable byte source

use crate::error::{LifError, Result};
use crate::{LIF_MAGIC, MEMORY_MARKER};
use std::io::{Read, Seek, SeekFrom};

/// Positioned reader for LIF primitives.
///
/// Wraps any `Read + Seek` source and exposes the handful of operations the
/// container format is built from: little-endian integer reads and assertions
/// on the fixed magic/marker bytes. Assertions have a lenient mode that
/// returns a boolean instead of failing, used for heuristic lookahead.
pub struct ByteReader<R> {
    inner: R,
}

impl<R: Read + Seek> ByteReader<R> {
    /// Wrap a seekable byte source
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Current byte position in the source
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to a new position
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.inner.seek(pos)?)
    }

    /// Total length of the source, preserving the current position
    pub fn source_len(&mut self) -> Result<u64> {
        let position = self.inner.stream_position()?;
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(len)
    }

    /// Read exactly `buf.len()` bytes.
    ///
    /// A short read surfaces as `InvalidFormat` rather than an I/O error so
    /// the block scanner can route it through the truncation heuristic; other
    /// I/O failures propagate unchanged.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let position = self.position()?;
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                LifError::InvalidFormat(format!(
                    "unexpected end of file reading {} bytes at offset {}",
                    buf.len(),
                    position
                ))
            } else {
                LifError::Io(e)
            }
        })
    }

    /// Read up to `buf.len()` bytes, returning how many were available
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Read exactly `len` bytes into a fresh buffer
    pub fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read a little-endian u32 at the current position
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian u64 at the current position
    pub fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Assert the 4-byte LIF magic signature at the current position.
    ///
    /// In lenient mode a mismatch (or end of file) returns `Ok(false)` and
    /// the position still advances past the bytes read.
    pub fn check_magic(&mut self, lenient: bool) -> Result<bool> {
        let position = self.position()?;
        let mut buf = [0u8; 4];
        let n = self.read_up_to(&mut buf)?;
        if n == 4 && &buf == LIF_MAGIC {
            return Ok(true);
        }
        if lenient {
            return Ok(false);
        }
        Err(LifError::InvalidFormat(format!(
            "expected LIF magic bytes at offset {position}; this is probably not a LIF file"
        )))
    }

    /// Assert the 1-byte memory marker at the current position.
    ///
    /// Same lenient contract as [`check_magic`](Self::check_magic).
    pub fn check_memory_marker(&mut self, lenient: bool) -> Result<bool> {
        let position = self.position()?;
        let mut buf = [0u8; 1];
        let n = self.read_up_to(&mut buf)?;
        if n == 1 && buf[0] == MEMORY_MARKER {
            return Ok(true);
        }
        if lenient {
            return Ok(false);
        }
        Err(LifError::InvalidFormat(format!(
            "expected LIF memory marker at offset {position}"
        )))
    }
}
