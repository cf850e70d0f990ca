//! Volume dimensions and the flat voxel addressing used by the packed buffer.
//!
//! The packed volume is laid out segment-major:
//!
//! ```text
//! flat = segment * xyz + slice * xy + row * x + column
//! ```
//!
//! so every (segment, slice) pair owns one contiguous frame of `xy` voxels.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegError};

/// Extent of one segmentation volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims {
    /// Columns per slice.
    pub x: usize,
    /// Rows per slice.
    pub y: usize,
    /// Number of slices.
    pub z: usize,
    /// Voxels per slice (`x * y`).
    pub xy: usize,
    /// Voxels per segment (`x * y * z`).
    pub xyz: usize,
}

impl Dims {
    pub const fn new(columns: usize, rows: usize, slices: usize) -> Self {
        let xy = columns * rows;
        Self {
            x: columns,
            y: rows,
            z: slices,
            xy,
            xyz: xy * slices,
        }
    }

    /// Like [`Dims::new`], for extents read from a container. Fails with
    /// [`SegError::Format`] when `xy` or `xyz` does not fit in `usize`.
    pub fn try_new(columns: usize, rows: usize, slices: usize) -> Result<Self> {
        let overflow = || {
            SegError::Format(format!(
                "volume of {columns}x{rows}x{slices} voxels is too large to address"
            ))
        };
        let xy = columns.checked_mul(rows).ok_or_else(overflow)?;
        let xyz = xy.checked_mul(slices).ok_or_else(overflow)?;
        Ok(Self {
            x: columns,
            y: rows,
            z: slices,
            xy,
            xyz,
        })
    }
}

/// Position of a single voxel in the 4-D index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelIndex {
    pub segment: usize,
    pub slice: usize,
    pub pixel: usize,
}

/// Maps (dense segment, slice, pixel) triples to flat voxel offsets and back.
///
/// # Panics
/// Every method panics on out-of-range arguments. Callers derive indices from
/// the same `Dims` and catalog size, so a bad index is a bug, not bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLayout {
    dims: Dims,
    segments: usize,
}

impl VolumeLayout {
    pub const fn new(dims: Dims, segments: usize) -> Self {
        Self { dims, segments }
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Total voxel count, `N * xyz`.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments * self.dims.xyz
    }

    /// `N * xyz`, or `None` when it overflows `usize`.
    #[inline]
    pub fn checked_len(&self) -> Option<usize> {
        self.segments.checked_mul(self.dims.xyz)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of frames in the persisted container, `N * z`.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.segments * self.dims.z
    }

    #[inline]
    pub fn flat_index(&self, segment: usize, slice: usize, pixel: usize) -> usize {
        assert!(
            segment < self.segments,
            "segment index {segment} out of range (segments {})",
            self.segments
        );
        assert!(
            slice < self.dims.z,
            "slice index {slice} out of range (slices {})",
            self.dims.z
        );
        assert!(
            pixel < self.dims.xy,
            "pixel offset {pixel} out of range (pixels per slice {})",
            self.dims.xy
        );
        segment * self.dims.xyz + slice * self.dims.xy + pixel
    }

    pub fn delinearize(&self, flat: usize) -> VoxelIndex {
        assert!(
            flat < self.len(),
            "flat index {flat} out of range (voxels {})",
            self.len()
        );
        VoxelIndex {
            segment: flat / self.dims.xyz,
            slice: (flat % self.dims.xyz) / self.dims.xy,
            pixel: flat % self.dims.xy,
        }
    }

    /// Flat range covering the whole frame of one (segment, slice) pair.
    #[inline]
    pub fn frame_range(&self, segment: usize, slice: usize) -> Range<usize> {
        let start = self.flat_index(segment, slice, 0);
        start..start + self.dims.xy
    }
}
