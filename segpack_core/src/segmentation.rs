//! Encode a mask store into a packed volume and decode it back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::bitpack::{pack_into, packed_len, unpack};
use crate::catalog::{SegmentCatalog, SparseSegmentList};
use crate::dims::{Dims, VolumeLayout};
use crate::error::{Result, SegError};
use crate::mask_store::{Mask, ToolState};

/// One slice of the source image stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceDescriptor {
    pub image_id: String,
    pub columns: u32,
    pub rows: u32,
    /// The image is one frame of a multi-frame instance.
    #[serde(default)]
    pub multi_frame: bool,
}

impl SliceDescriptor {
    pub fn new(image_id: impl Into<String>, columns: u32, rows: u32) -> Self {
        Self {
            image_id: image_id.into(),
            columns,
            rows,
            multi_frame: false,
        }
    }
}

/// Bit-packed multi-segment volume with its dimensions and catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedVolume {
    dims: Dims,
    bits: Vec<u8>,
    catalog: SegmentCatalog,
}

impl PackedVolume {
    /// Wrap an existing bit buffer, which must be exactly
    /// `ceil(N * xyz / 8)` bytes long.
    pub fn new(dims: Dims, bits: Vec<u8>, catalog: SegmentCatalog) -> Result<Self> {
        let voxels = VolumeLayout::new(dims, catalog.len())
            .checked_len()
            .ok_or_else(|| {
                SegError::Format(format!(
                    "{} segments of {}x{}x{} voxels are too large to address",
                    catalog.len(),
                    dims.x,
                    dims.y,
                    dims.z
                ))
            })?;
        let expected = packed_len(voxels);
        if bits.len() != expected {
            return Err(SegError::Format(format!(
                "packed buffer is {} bytes but {} segments of {}x{}x{} need {}",
                bits.len(),
                catalog.len(),
                dims.x,
                dims.y,
                dims.z,
                expected
            )));
        }
        Ok(Self {
            dims,
            bits,
            catalog,
        })
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    #[inline]
    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    #[inline]
    pub fn layout(&self) -> VolumeLayout {
        VolumeLayout::new(self.dims, self.catalog.len())
    }

    /// Exact voxel count, excluding padding bits.
    pub fn voxel_count(&self) -> usize {
        self.layout().len()
    }

    pub fn into_parts(self) -> (Dims, Vec<u8>, SegmentCatalog) {
        (self.dims, self.bits, self.catalog)
    }
}

/// Output of [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSegmentation {
    pub tool_state: ToolState,
    pub catalog: SegmentCatalog,
}

/// Shared dims of `slices`; every slice must have the same rows and columns.
pub fn slice_dims(slices: &[SliceDescriptor]) -> Result<Dims> {
    let first = slices
        .first()
        .ok_or_else(|| SegError::DimensionMismatch("slice sequence is empty".into()))?;
    if let Some((i, odd)) = slices
        .iter()
        .enumerate()
        .find(|(_, s)| s.columns != first.columns || s.rows != first.rows)
    {
        return Err(SegError::DimensionMismatch(format!(
            "slice {} ({}) is {}x{} but slice 0 ({}) is {}x{}",
            i, odd.image_id, odd.columns, odd.rows, first.image_id, first.columns, first.rows
        )));
    }
    Dims::try_new(first.columns as usize, first.rows as usize, slices.len())
}

/// Pack every active segment of `tool_state` over `slices`.
///
/// Missing masks encode as zero. Masks for slots that are holes, or for
/// slices outside `slices`, are skipped.
pub fn encode(
    slices: &[SliceDescriptor],
    segments: &SparseSegmentList,
    tool_state: &ToolState,
) -> Result<PackedVolume> {
    let dims = slice_dims(slices)?;
    let catalog = SegmentCatalog::from_sparse(segments)?;
    let layout = VolumeLayout::new(dims, catalog.len());

    debug!(
        segments = catalog.len(),
        slices = dims.z,
        columns = dims.x,
        rows = dims.y,
        "encoding segmentation"
    );
    warn_unused_masks(slices, &catalog, tool_state);

    let voxels = layout.checked_len().ok_or_else(|| {
        SegError::DimensionMismatch(format!(
            "{} segments over {} slices of {}x{} are too large to address",
            catalog.len(),
            dims.z,
            dims.x,
            dims.y
        ))
    })?;
    let mut bits = vec![0u8; packed_len(voxels)];
    let mut frames_written = 0usize;
    for entry in &catalog {
        for (z, slice) in slices.iter().enumerate() {
            let Some(mask) = tool_state.get_mask(&slice.image_id, entry.segment_id) else {
                continue;
            };
            if mask.len() != dims.xy {
                return Err(SegError::DimensionMismatch(format!(
                    "mask for segment {} on slice {} has {} voxels, expected {}",
                    entry.segment_id,
                    slice.image_id,
                    mask.len(),
                    dims.xy
                )));
            }
            let range = layout.frame_range(entry.dense_index, z);
            trace!(segment = entry.segment_id, slice = z, offset = range.start, "packing frame");
            pack_into(&mut bits, range.start, &mask.data);
            frames_written += 1;
        }
    }

    debug!(
        frames = layout.frame_count(),
        frames_written,
        bytes = bits.len(),
        "segmentation encoded"
    );
    PackedVolume::new(dims, bits, catalog)
}

fn warn_unused_masks(slices: &[SliceDescriptor], catalog: &SegmentCatalog, tool_state: &ToolState) {
    let positions: HashMap<&str, usize> = slices
        .iter()
        .enumerate()
        .map(|(z, s)| (s.image_id.as_str(), z))
        .collect();

    let mut unknown_slice = 0usize;
    let mut unknown_segment = 0usize;
    for (slice_id, segment_id, _) in tool_state.masks() {
        if !positions.contains_key(slice_id) {
            unknown_slice += 1;
        } else if catalog.dense_index_of(segment_id).is_none() {
            unknown_segment += 1;
        }
    }
    if unknown_slice > 0 || unknown_segment > 0 {
        warn!(
            unknown_slice,
            unknown_segment, "ignoring masks outside the slice sequence or segment list"
        );
    }
}

/// Rebuild a mask store from `volume`, one fresh invalidated mask per
/// (slice, segment) pair. `slice_ids` names the slices in volume order.
pub fn decode<S: AsRef<str>>(slice_ids: &[S], volume: &PackedVolume) -> Result<DecodedSegmentation> {
    let dims = volume.dims();
    if slice_ids.len() != dims.z {
        return Err(SegError::DimensionMismatch(format!(
            "{} slice ids given but the volume has {} slices",
            slice_ids.len(),
            dims.z
        )));
    }

    let layout = volume.layout();
    debug!(
        segments = layout.segments(),
        slices = dims.z,
        voxels = layout.len(),
        "decoding segmentation"
    );
    let voxels = unpack(volume.bits(), layout.len())?;

    let mut tool_state = ToolState::new();
    for entry in volume.catalog() {
        for (z, slice_id) in slice_ids.iter().enumerate() {
            let frame = &voxels[layout.frame_range(entry.dense_index, z)];
            tool_state.put_mask(slice_id.as_ref(), entry.segment_id, Mask::invalidated(frame.to_vec()));
        }
    }

    Ok(DecodedSegmentation {
        tool_state,
        catalog: volume.catalog().clone(),
    })
}
