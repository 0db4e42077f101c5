//! Container access - opening a LIF file and looking up its images

use crate::error::{LifError, Result};
use crate::image::LifImage;
use crate::meta::{self, ImageDescriptor};
use crate::reader::ByteReader;
use crate::scan::{self, MemoryBlock};
use crate::xml;
use std::fs::File;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

/// An opened LIF container.
///
/// Built once by [`open`](Self::open) and immutable afterwards: the XML
/// header is parsed into one descriptor per image, the data blocks are
/// discovered by a sequential scan, and descriptor `i` is paired with block
/// `i` by position. Metadata access is safe to share across threads; plane
/// reads each use their own file handle.
#[derive(Debug)]
pub struct LifFile {
    path: PathBuf,
    file_len: u64,
    xml_header: String,
    descriptors: Vec<ImageDescriptor>,
    blocks: Vec<MemoryBlock>,
    truncated: bool,
}

impl LifFile {
    /// Open a LIF container: validate the header, parse the XML metadata,
    /// scan for data blocks, and reconcile the two.
    ///
    /// Fails fast on any format violation. A file whose tail was lost
    /// mid-write is still opened: the scanner's truncation heuristic marks
    /// the missing blocks and their frames read as zeros (a warning is
    /// logged once).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = ByteReader::new(File::open(&path)?);
        let file_len = reader.source_len()?;

        reader.check_magic(false)?;
        reader.seek(SeekFrom::Start(8))?;
        reader.check_memory_marker(false)?;

        let header_units = reader.read_u32_le()? as usize;
        let raw_header = reader.read_exact_vec(header_units * 2)?;
        let xml_header = xml::decode_utf16_header(&raw_header)?;
        let root = xml::parse_document(&xml_header)?;
        let descriptors = meta::find_images(&root)?;

        let outcome = scan::scan_blocks(&mut reader, file_len)?;
        let mut blocks = outcome.blocks;
        let truncated = outcome.truncation_offset.is_some();

        if let Some(offset) = outcome.truncation_offset {
            // The magic bytes that would locate the remaining blocks are
            // gone; stand in zero-length blocks at the truncation point.
            while blocks.len() < descriptors.len() {
                blocks.push(MemoryBlock { offset, len: 0 });
            }
        } else if blocks.len() != descriptors.len() {
            return Err(LifError::Inconsistent(format!(
                "{} images described in metadata but {} data blocks found",
                descriptors.len(),
                blocks.len()
            )));
        }

        Ok(Self {
            path,
            file_len,
            xml_header,
            descriptors,
            blocks,
            truncated,
        })
    }

    /// Number of images in the container
    pub fn image_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Descriptor of the image at `index`, in metadata traversal order
    pub fn descriptor(&self, index: usize) -> Result<&ImageDescriptor> {
        self.descriptors.get(index).ok_or_else(|| {
            LifError::OutOfBounds(format!(
                "image index {index} out of range ({} images)",
                self.descriptors.len()
            ))
        })
    }

    /// Open the image at `index` for frame reads
    pub fn get_image(&self, index: usize) -> Result<LifImage> {
        let descriptor = self.descriptor(index)?.clone();
        Ok(LifImage::new(
            self.path.clone(),
            descriptor,
            self.blocks[index],
        ))
    }

    /// Iterate every image in the container, in index order
    pub fn iter_images(&self) -> impl Iterator<Item = LifImage> + '_ {
        self.descriptors
            .iter()
            .zip(self.blocks.iter())
            .map(|(descriptor, block)| {
                LifImage::new(self.path.clone(), descriptor.clone(), *block)
            })
    }

    /// All image descriptors, in index order
    pub fn descriptors(&self) -> &[ImageDescriptor] {
        &self.descriptors
    }

    /// All discovered data blocks, in index order
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Whether the truncation heuristic fired during the scan
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The decoded XML header text
    pub fn xml_header(&self) -> &str {
        &self.xml_header
    }

    /// Total container length in bytes
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Path this container was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = LifFile::open("/nonexistent/container.lif").unwrap_err();
        assert!(matches!(err, LifError::Io(_)));
    }

    #[test]
    fn test_open_non_lif_file_fails_fast() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not a lif container at all").unwrap();
        file.flush().unwrap();

        let err = LifFile::open(file.path()).unwrap_err();
        assert!(matches!(err, LifError::InvalidFormat(_)));
    }
}
