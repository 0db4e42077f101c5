//! OpenLIF - Leica Image File reader
//!
//! A pure Rust decoder for the Leica Image File (LIF) microscope container:
//! a single file holding a UTF-16 XML header that describes a hierarchical
//! tree of acquisitions, plus a sequence of raw pixel data blocks.
//!
//! # Features
//!
//! - Enumerate every image embedded in a container without loading pixel data
//! - Random access to any 2-D plane by (channel, z, time, tile) coordinate
//! - Stride-based addressing for single planes and whole tile stacks
//! - Recovery heuristic for files truncated mid-write (blank frames read as zeros)
//! - Typed plane materialization into `ndarray` arrays
//!
//! Writing, compressed pixel encodings, and repair of corrupt XML metadata are
//! out of scope; those fail the open instead of degrading.
//!
//! # Example
//!
//! ```rust,ignore
//! use openlif::LifFile;
//!
//! let lif = LifFile::open("/data/experiment.lif")?;
//! for image in lif.iter_images() {
//!     let first_plane = image.read_frame(0, 0, 0, 0)?;
//!     println!("{}: {} bytes", image.descriptor().name, first_plane.len());
//! }
//! # Ok::<(), openlif::LifError>(())
//! ```

pub mod error;
pub mod file;
pub mod image;
pub mod meta;
pub mod reader;
pub mod scan;
pub mod utils;
pub mod xml;

// Re-exports
pub use error::{LifError, Result};
pub use file::LifFile;
pub use image::{FrameCoord, FrameIter, LifImage};
pub use meta::{Axis, ChannelDescriptor, ImageDescriptor};
pub use reader::ByteReader;
pub use scan::MemoryBlock;

/// Version of the OpenLIF implementation
pub const OPENLIF_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic signature opening the file and every data block header
pub const LIF_MAGIC: &[u8; 4] = &[0x70, 0x00, 0x00, 0x00];

/// Marker byte preceding every length field in the container
pub const MEMORY_MARKER: u8 = 0x2A;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!OPENLIF_VERSION.is_empty());
    }
}
