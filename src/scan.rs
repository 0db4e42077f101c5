//! Sequential discovery of raw data blocks in a LIF container

use crate::error::{LifError, Result};
use crate::reader::ByteReader;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};

/// Number of zero bytes that must follow a failed block header for the file
/// to be considered truncated rather than corrupt.
const TRUNCATION_PROBE_LEN: usize = 100;

/// Location of one raw pixel payload inside the container.
///
/// `len == 0` is a sentinel meaning the data is absent because the file was
/// truncated; reads against such a block synthesize zero-filled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    /// Absolute file offset of the first payload byte
    pub offset: u64,
    /// Payload length in bytes
    pub len: u64,
}

impl MemoryBlock {
    /// Whether this block stands in for data lost to truncation
    pub fn is_truncated(&self) -> bool {
        self.len == 0
    }
}

/// Result of scanning the container past the XML header
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Discovered blocks, in file order
    pub blocks: Vec<MemoryBlock>,
    /// Offset at which scanning stopped because the file tail is zero-filled
    pub truncation_offset: Option<u64>,
}

/// Walk the container from the current position to end of file, discovering
/// every raw-data block.
///
/// Each block header is `[4B magic][4B reserved][1B marker][4B or 8B length]
/// [4B description length D][2D description bytes][payload]`; the 8-byte
/// length form is detected by the marker byte failing to follow the 4-byte
/// form. A failed magic or marker assertion triggers the truncation
/// heuristic; if it does not apply, the failure propagates as a format error.
pub fn scan_blocks<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    file_len: u64,
) -> Result<ScanOutcome> {
    let mut blocks = Vec::new();
    let mut truncation_offset = None;

    while reader.position()? < file_len {
        let block_len = match read_block_header(reader) {
            Ok(len) => len,
            Err(LifError::InvalidFormat(msg)) => {
                if check_truncated(reader)? {
                    let offset = reader.position()?;
                    log::warn!(
                        "LIF file appears truncated at offset {offset}; \
                         remaining images will read as blank"
                    );
                    truncation_offset = Some(offset);
                    reader.seek(SeekFrom::End(0))?;
                    break;
                }
                return Err(LifError::InvalidFormat(msg));
            }
            Err(e) => return Err(e),
        };

        let description_len = u64::from(reader.read_u32_le()?) * 2;
        if block_len > 0 {
            let position = reader.position()?;
            blocks.push(MemoryBlock {
                offset: position + description_len,
                len: block_len,
            });
        }

        let skip = description_len.checked_add(block_len).and_then(|n| i64::try_from(n).ok());
        match skip {
            Some(n) => reader.seek(SeekFrom::Current(n))?,
            None => {
                return Err(LifError::InvalidFormat(format!(
                    "block length {block_len} overflows the addressable range"
                )))
            }
        };
    }

    log::debug!(
        "scanned {} data blocks{}",
        blocks.len(),
        if truncation_offset.is_some() { " (truncated)" } else { "" }
    );

    Ok(ScanOutcome {
        blocks,
        truncation_offset,
    })
}

/// Steps 1-2 of the block scan: assert magic and marker bytes, then read the
/// block length in its 4-byte or 8-byte encoding. Failures here are the only
/// ones eligible for truncation recovery.
fn read_block_header<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<u64> {
    reader.check_magic(false)?;
    reader.seek(SeekFrom::Current(4))?;
    reader.check_memory_marker(false)?;

    let block_len = u64::from(reader.read_u32_le()?);
    if reader.check_memory_marker(true)? {
        return Ok(block_len);
    }

    // Large-block encoding: the length is 8 bytes, not 4. Back up over the
    // 4-byte value plus the byte consumed by the failed marker check.
    reader.seek(SeekFrom::Current(-5))?;
    let block_len = reader.read_u64_le()?;
    reader.check_memory_marker(false)?;
    Ok(block_len)
}

/// Truncation heuristic: anchored 4 bytes before the failure point, a run of
/// 100 zero bytes means the writer stopped mid-file. The position is left at
/// the anchor so the caller can record it as the truncation offset.
fn check_truncated<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<bool> {
    let position = reader.position()?;
    let anchor = position.saturating_sub(4);
    reader.seek(SeekFrom::Start(anchor))?;

    let mut probe = [0u8; TRUNCATION_PROBE_LEN];
    let n = reader.read_up_to(&mut probe)?;
    reader.seek(SeekFrom::Start(anchor))?;

    Ok(n == TRUNCATION_PROBE_LEN && probe.iter().all(|&b| b == 0))
}
