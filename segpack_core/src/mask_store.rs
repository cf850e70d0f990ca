//! Per-slice, per-segment masks as the annotation tool keeps them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::SegmentId;

/// Dense `rows * columns` mask of 0/1 voxels for one (slice, segment) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub data: Vec<u8>,
    /// Set on masks built by the codec: anything cached from the previous
    /// contents of this (slice, segment) pair must be rebuilt.
    #[serde(default)]
    pub invalidated: bool,
}

impl Mask {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            invalidated: false,
        }
    }

    pub fn invalidated(data: Vec<u8>) -> Self {
        Self {
            data,
            invalidated: true,
        }
    }

    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of set voxels.
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Masks of one slice, keyed by segment id.
pub type SliceMasks = BTreeMap<SegmentId, Mask>;

/// Mask store keyed by slice (image) id.
///
/// A missing slice or a missing segment within a slice reads as an all-zero
/// mask. Encoding cannot tell a segment that was erased back to nothing from
/// one that was never drawn; both come out as present-but-empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolState {
    slices: BTreeMap<String, SliceMasks>,
}

impl ToolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_mask(&self, slice_id: &str, segment_id: SegmentId) -> Option<&Mask> {
        self.slices.get(slice_id)?.get(&segment_id)
    }

    /// Store `mask`, replacing any mask already held for the pair.
    pub fn put_mask(&mut self, slice_id: impl Into<String>, segment_id: SegmentId, mask: Mask) {
        self.slices
            .entry(slice_id.into())
            .or_default()
            .insert(segment_id, mask);
    }

    pub fn slice(&self, slice_id: &str) -> Option<&SliceMasks> {
        self.slices.get(slice_id)
    }

    pub fn slice_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.slices.keys().map(String::as_str)
    }

    /// Number of segment masks stored for `slice_id`.
    pub fn segment_count(&self, slice_id: &str) -> usize {
        self.slices.get(slice_id).map_or(0, BTreeMap::len)
    }

    /// Every stored mask as `(slice id, segment id, mask)`.
    pub fn masks(&self) -> impl Iterator<Item = (&str, SegmentId, &Mask)> + '_ {
        self.slices.iter().flat_map(|(slice_id, masks)| {
            masks
                .iter()
                .map(move |(&segment_id, mask)| (slice_id.as_str(), segment_id, mask))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.slices.values().all(BTreeMap::is_empty)
    }
}
