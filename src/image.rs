//! Frame addressing for one image within an opened container

use crate::error::{LifError, Result};
use crate::meta::{Axis, ImageDescriptor};
use crate::scan::MemoryBlock;
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A (channel, z, time, tile) addressing coordinate.
///
/// Transient key for frame reads; each field is bounded by the matching
/// dimension size of the image descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCoord {
    pub c: usize,
    pub z: usize,
    pub t: usize,
    pub m: usize,
}

/// Handle to one image of a LIF container.
///
/// Holds the image descriptor and its paired data block; owns no file
/// handle. Every read opens, uses, and releases its own handle, so
/// concurrent reads through clones of the same handle never race on a
/// shared cursor.
#[derive(Debug, Clone)]
pub struct LifImage {
    path: PathBuf,
    descriptor: ImageDescriptor,
    block: MemoryBlock,
}

impl LifImage {
    pub(crate) fn new(path: PathBuf, descriptor: ImageDescriptor, block: MemoryBlock) -> Self {
        Self {
            path,
            descriptor,
            block,
        }
    }

    /// The image's metadata descriptor
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// The raw data block backing this image
    pub fn block(&self) -> MemoryBlock {
        self.block
    }

    /// Path of the container file this image reads from
    pub fn container_path(&self) -> &Path {
        &self.path
    }

    /// Read the single 2-D plane at (z, t, c, m).
    ///
    /// Returns `height * width` samples of the descriptor's byte depth.
    /// For a truncated block the plane is synthesized as zeros without
    /// touching the file.
    pub fn read_frame(&self, z: usize, t: usize, c: usize, m: usize) -> Result<Bytes> {
        self.check_axis(Axis::Z, z)?;
        self.check_axis(Axis::T, t)?;
        self.check_axis(Axis::Channel, c)?;
        self.check_axis(Axis::Tile, m)?;

        let d = &self.descriptor;
        let offset = c as u64 * d.stride(Axis::Channel)
            + z as u64 * d.stride(Axis::Z)
            + t as u64 * d.stride(Axis::T)
            + m as u64 * d.stride(Axis::Tile);
        self.read_at(self.block.offset + offset, d.plane_bytes())
    }

    /// Read the full stack for one tile: every channel, depth, and time
    /// position in storage order.
    ///
    /// Assumes the C/Z/T axes are contiguous once the tile axis is fixed, a
    /// layout property of the format itself.
    pub fn read_stack(&self, m: usize) -> Result<Bytes> {
        self.check_axis(Axis::Tile, m)?;

        let d = &self.descriptor;
        let samples = d.dim(Axis::Channel) * d.dim(Axis::Z) * d.dim(Axis::T) * d.plane_len();
        let offset = m as u64 * d.stride(Axis::Tile);
        self.read_at(self.block.offset + offset, samples * d.byte_depth())
    }

    /// Read a plane by flat index, `n` in `0..frame_count()`.
    ///
    /// Planes are assumed to be laid out back to back, each
    /// `height * width * byte_depth` bytes; this respects the declared
    /// channel byte depth rather than assuming 8-bit samples.
    pub fn read_plane(&self, n: usize) -> Result<Bytes> {
        let count = self.descriptor.frame_count();
        if n >= count {
            return Err(LifError::OutOfBounds(format!(
                "plane index {n} out of range ({count} planes)"
            )));
        }
        let plane_bytes = self.descriptor.plane_bytes();
        self.read_at(self.block.offset + (n * plane_bytes) as u64, plane_bytes)
    }

    /// Lazily iterate planes along one axis, holding the other three
    /// coordinates fixed.
    ///
    /// The iterator is finite, forward-only, and restartable: a fresh call
    /// starts again from coordinate 0. Only the C/Z/T/M axes address whole
    /// planes; Y and X are rejected.
    pub fn iter_axis(&self, axis: Axis, fixed: FrameCoord) -> Result<FrameIter<'_>> {
        match axis {
            Axis::Y | Axis::X => Err(LifError::OutOfBounds(format!(
                "axis {axis} addresses pixels within a plane and cannot be iterated frame-wise"
            ))),
            _ => Ok(FrameIter {
                image: self,
                axis,
                fixed,
                next: 0,
            }),
        }
    }

    /// Iterate the channel axis at fixed (z, t, m)
    pub fn iter_c(&self, z: usize, t: usize, m: usize) -> FrameIter<'_> {
        self.frame_iter(Axis::Channel, FrameCoord { c: 0, z, t, m })
    }

    /// Iterate the z axis at fixed (t, c, m)
    pub fn iter_z(&self, t: usize, c: usize, m: usize) -> FrameIter<'_> {
        self.frame_iter(Axis::Z, FrameCoord { c, z: 0, t, m })
    }

    /// Iterate the time axis at fixed (z, c, m)
    pub fn iter_t(&self, z: usize, c: usize, m: usize) -> FrameIter<'_> {
        self.frame_iter(Axis::T, FrameCoord { c, z, t: 0, m })
    }

    /// Iterate the tile axis at fixed (z, t, c)
    pub fn iter_m(&self, z: usize, t: usize, c: usize) -> FrameIter<'_> {
        self.frame_iter(Axis::Tile, FrameCoord { c, z, t, m: 0 })
    }

    fn frame_iter(&self, axis: Axis, fixed: FrameCoord) -> FrameIter<'_> {
        FrameIter {
            image: self,
            axis,
            fixed,
            next: 0,
        }
    }

    fn check_axis(&self, axis: Axis, value: usize) -> Result<()> {
        let size = self.descriptor.dim(axis);
        if value >= size {
            return Err(LifError::OutOfBounds(format!(
                "{axis} coordinate {value} out of range ({size} available)"
            )));
        }
        Ok(())
    }

    /// Positioned read with a scoped file handle; truncated blocks
    /// synthesize zero-filled output instead.
    fn read_at(&self, position: u64, len: usize) -> Result<Bytes> {
        if self.block.is_truncated() {
            return Ok(Bytes::from(vec![0u8; len]));
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(position))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Forward-only plane iterator along one axis; see [`LifImage::iter_axis`]
pub struct FrameIter<'a> {
    image: &'a LifImage,
    axis: Axis,
    fixed: FrameCoord,
    next: usize,
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.image.descriptor.dim(self.axis) {
            return None;
        }
        let mut coord = self.fixed;
        match self.axis {
            Axis::Channel => coord.c = self.next,
            Axis::Z => coord.z = self.next,
            Axis::T => coord.t = self.next,
            Axis::Tile => coord.m = self.next,
            // iter_axis rejects Y and X up front
            Axis::Y | Axis::X => return None,
        }
        self.next += 1;
        Some(self.image.read_frame(coord.z, coord.t, coord.c, coord.m))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.image.descriptor.dim(self.axis).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ChannelDescriptor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// 2 channels x 2 z-planes of 4x2 u8 pixels, planes numbered by value
    fn test_image() -> (NamedTempFile, LifImage) {
        let descriptor = ImageDescriptor {
            path: "demo.lif/".to_string(),
            name: "img".to_string(),
            channels: vec![
                ChannelDescriptor {
                    bytes_inc: 0,
                    resolution: 8,
                },
                ChannelDescriptor {
                    bytes_inc: 8,
                    resolution: 8,
                },
            ],
            dims: [2, 2, 1, 1, 2, 4],
            strides: [8, 16, 0, 0, 4, 1],
            scale: [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            tile_positions: Vec::new(),
        };

        let mut payload = Vec::new();
        for plane in 0u8..4 {
            payload.extend_from_slice(&[plane; 8]);
        }

        let mut file = NamedTempFile::new().unwrap();
        // Arbitrary leading bytes stand in for the container header
        file.write_all(&[0xEE; 10]).unwrap();
        file.write_all(&payload).unwrap();
        file.flush().unwrap();

        let block = MemoryBlock {
            offset: 10,
            len: payload.len() as u64,
        };
        let image = LifImage::new(file.path().to_path_buf(), descriptor, block);
        (file, image)
    }

    #[test]
    fn test_read_frame_stride_addressing() {
        let (_file, image) = test_image();
        // Plane order in the payload: (z0,c0), (z0,c1), (z1,c0), (z1,c1)
        assert_eq!(&image.read_frame(0, 0, 0, 0).unwrap()[..], &[0u8; 8]);
        assert_eq!(&image.read_frame(0, 0, 1, 0).unwrap()[..], &[1u8; 8]);
        assert_eq!(&image.read_frame(1, 0, 0, 0).unwrap()[..], &[2u8; 8]);
        assert_eq!(&image.read_frame(1, 0, 1, 0).unwrap()[..], &[3u8; 8]);
    }

    #[test]
    fn test_out_of_range_names_axis() {
        let (_file, image) = test_image();
        let err = image.read_frame(2, 0, 0, 0).unwrap_err();
        assert!(err.to_string().contains("z coordinate 2"));
        let err = image.read_frame(0, 1, 0, 0).unwrap_err();
        assert!(err.to_string().contains("t coordinate 1"));
        let err = image.read_frame(0, 0, 2, 0).unwrap_err();
        assert!(err.to_string().contains("c coordinate 2"));
        let err = image.read_frame(0, 0, 0, 1).unwrap_err();
        assert!(err.to_string().contains("m coordinate 1"));
    }

    #[test]
    fn test_read_stack_is_contiguous() {
        let (_file, image) = test_image();
        let stack = image.read_stack(0).unwrap();
        assert_eq!(stack.len(), 32);
        assert_eq!(&stack[..8], &[0u8; 8]);
        assert_eq!(&stack[24..], &[3u8; 8]);
    }

    #[test]
    fn test_read_plane_flat_index() {
        let (_file, image) = test_image();
        assert_eq!(&image.read_plane(2).unwrap()[..], &[2u8; 8]);
        assert!(matches!(
            image.read_plane(4),
            Err(LifError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_iterators_restart() {
        let (_file, image) = test_image();
        let first: Vec<Bytes> = image.iter_z(0, 1, 0).collect::<Result<_>>().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(&first[0][..], &[1u8; 8]);
        assert_eq!(&first[1][..], &[3u8; 8]);

        // A fresh call restarts from z = 0
        let again: Vec<Bytes> = image.iter_z(0, 1, 0).collect::<Result<_>>().unwrap();
        assert_eq!(&again[0][..], &[1u8; 8]);
    }

    #[test]
    fn test_iter_axis_rejects_pixel_axes() {
        let (_file, image) = test_image();
        assert!(image.iter_axis(Axis::X, FrameCoord::default()).is_err());
        assert!(image.iter_axis(Axis::Z, FrameCoord::default()).is_ok());
    }

    #[test]
    fn test_truncated_block_reads_zeros() {
        let (_file, image) = test_image();
        let truncated = LifImage::new(
            PathBuf::from("/nonexistent/file.lif"),
            image.descriptor().clone(),
            MemoryBlock { offset: 99, len: 0 },
        );
        // No file access happens: the path does not even exist
        let plane = truncated.read_frame(1, 0, 1, 0).unwrap();
        assert_eq!(&plane[..], &[0u8; 8]);
        let stack = truncated.read_stack(0).unwrap();
        assert_eq!(stack.len(), 32);
        // The flat-index accessor takes the same path
        let flat = truncated.read_plane(3).unwrap();
        assert_eq!(&flat[..], &[0u8; 8]);
    }
}
