//! Normalized segmentation dataset and the container collaborator boundary.
//!
//! Container adapters turn bytes into a [`RawDataset`] (keyword attributes
//! plus raw pixel bytes); [`RawDataset::normalize`] then produces the one
//! [`SegmentationDataset`] shape the codec works with, whichever form the
//! segment metadata took on disk.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::catalog::{SegmentCatalog, SegmentRecord, SegmentSequence, SparseSegmentList};
use crate::dims::Dims;
use crate::error::{Result, SegError};
use crate::mask_store::ToolState;
use crate::segmentation::{decode, encode, PackedVolume, SliceDescriptor};

/// Attribute keywords understood by [`RawDataset::normalize`].
pub mod keywords {
    pub const MODALITY: &str = "Modality";
    pub const SEGMENTATION_TYPE: &str = "SegmentationType";
    pub const BITS_ALLOCATED: &str = "BitsAllocated";
    pub const SERIES_INSTANCE_UID: &str = "SeriesInstanceUID";
    pub const ROWS: &str = "Rows";
    pub const COLUMNS: &str = "Columns";
    pub const NUMBER_OF_FRAMES: &str = "NumberOfFrames";
    pub const SEGMENT_SEQUENCE: &str = "SegmentSequence";
    pub const REFERENCED_SLICES: &str = "ReferencedSlices";
}

/// Container contents before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDataset {
    pub attributes: Map<String, Value>,
    pub pixel_data: Vec<u8>,
}

/// A BINARY segmentation as the codec sees a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationDataset {
    pub series_instance_uid: String,
    pub rows: u32,
    pub columns: u32,
    /// Segments times slices.
    pub number_of_frames: u32,
    pub segment_sequence: SegmentSequence,
    /// Slices the volume was encoded over. Empty for containers that do not
    /// record them.
    pub referenced_slices: Vec<SliceDescriptor>,
    pub pixel_data: Vec<u8>,
}

/// Decoded segmentation handed back to the annotation tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationImport {
    pub series_instance_uid: String,
    pub segments: Vec<SegmentRecord>,
    pub tool_state: ToolState,
}

impl SegmentationImport {
    /// Slot list matching the ids used in `tool_state`.
    pub fn segment_list(&self) -> SparseSegmentList {
        let mut list = SparseSegmentList::new();
        for (position, record) in self.segments.iter().enumerate() {
            let id = record.segment_id.unwrap_or(position as u32);
            list.insert(id, record.descriptor.clone());
        }
        list
    }
}

/// Bytes-to-dataset collaborator. Codec logic never touches container bytes
/// directly; it only sees what an implementation of this trait returns.
pub trait ContainerIo {
    /// Short format name for logs and CLI output.
    fn name(&self) -> &'static str;

    fn read_container(&self, bytes: &[u8]) -> Result<RawDataset>;

    fn normalize_dataset(&self, raw: RawDataset) -> Result<SegmentationDataset> {
        raw.normalize()
    }

    fn serialize_dataset(&self, dataset: &SegmentationDataset) -> Result<Vec<u8>>;

    /// `read_container` followed by `normalize_dataset`.
    fn load(&self, bytes: &[u8]) -> Result<SegmentationDataset> {
        let raw = self.read_container(bytes)?;
        self.normalize_dataset(raw)
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| SegError::Format(format!("{what} {value} does not fit in 32 bits")))
}

impl SegmentationDataset {
    pub fn from_volume(
        volume: &PackedVolume,
        series_instance_uid: impl Into<String>,
        referenced_slices: Vec<SliceDescriptor>,
    ) -> Result<Self> {
        let dims = volume.dims();
        Ok(Self {
            series_instance_uid: series_instance_uid.into(),
            rows: to_u32(dims.y, "row count")?,
            columns: to_u32(dims.x, "column count")?,
            number_of_frames: to_u32(volume.layout().frame_count(), "frame count")?,
            segment_sequence: volume.catalog().to_sequence(),
            referenced_slices,
            pixel_data: volume.bits().to_vec(),
        })
    }

    /// Image ids of the referenced slices, in volume order.
    pub fn slice_ids(&self) -> Vec<String> {
        self.referenced_slices
            .iter()
            .map(|s| s.image_id.clone())
            .collect()
    }

    /// Segment count implied by the segment sequence.
    pub fn segment_count(&self) -> usize {
        self.segment_sequence.len()
    }

    /// Rebuild the packed volume, checking the declared frames against
    /// `slice_count` slices.
    pub fn into_volume(self, slice_count: usize) -> Result<PackedVolume> {
        let frames = self.number_of_frames as usize;
        if slice_count == 0 {
            return Err(SegError::DimensionMismatch("slice count is zero".into()));
        }
        if frames % slice_count != 0 {
            return Err(SegError::DimensionMismatch(format!(
                "{frames} frames do not divide evenly over {slice_count} slices"
            )));
        }

        let catalog = SegmentCatalog::from_sequence(&self.segment_sequence)?;
        if frames / slice_count != catalog.len() {
            return Err(SegError::Format(format!(
                "{} frames over {} slices imply {} segments but the segment sequence has {}",
                frames,
                slice_count,
                frames / slice_count,
                catalog.len()
            )));
        }

        let dims = Dims::try_new(self.columns as usize, self.rows as usize, slice_count)?;
        PackedVolume::new(dims, self.pixel_data, catalog)
    }

    /// Keyword attributes and pixel bytes for a container adapter to write.
    pub fn to_raw(&self) -> Result<RawDataset> {
        let mut attributes = Map::new();
        attributes.insert(keywords::MODALITY.into(), json!("SEG"));
        attributes.insert(keywords::SEGMENTATION_TYPE.into(), json!("BINARY"));
        attributes.insert(keywords::BITS_ALLOCATED.into(), json!(1));
        attributes.insert(
            keywords::SERIES_INSTANCE_UID.into(),
            json!(self.series_instance_uid),
        );
        attributes.insert(keywords::ROWS.into(), json!(self.rows));
        attributes.insert(keywords::COLUMNS.into(), json!(self.columns));
        attributes.insert(keywords::NUMBER_OF_FRAMES.into(), json!(self.number_of_frames));
        attributes.insert(
            keywords::SEGMENT_SEQUENCE.into(),
            serde_json::to_value(&self.segment_sequence)?,
        );
        if !self.referenced_slices.is_empty() {
            attributes.insert(
                keywords::REFERENCED_SLICES.into(),
                serde_json::to_value(&self.referenced_slices)?,
            );
        }
        Ok(RawDataset {
            attributes,
            pixel_data: self.pixel_data.clone(),
        })
    }
}

impl RawDataset {
    pub fn normalize(mut self) -> Result<SegmentationDataset> {
        if let Some(kind) = self.attributes.get(keywords::SEGMENTATION_TYPE) {
            if kind.as_str() != Some("BINARY") {
                return Err(SegError::Format(format!(
                    "unsupported segmentation type {kind}; only BINARY is handled"
                )));
            }
        }
        if let Some(bits) = self.attributes.get(keywords::BITS_ALLOCATED) {
            if bits.as_u64() != Some(1) {
                return Err(SegError::Format(format!(
                    "BINARY segmentations allocate 1 bit per voxel, found {bits}"
                )));
            }
        }

        let series_instance_uid = match self.attributes.remove(keywords::SERIES_INSTANCE_UID) {
            Some(Value::String(uid)) => uid,
            Some(other) => {
                return Err(SegError::Format(format!(
                    "{} must be a string, found {other}",
                    keywords::SERIES_INSTANCE_UID
                )))
            }
            None => String::new(),
        };
        let rows = self.required_u32(keywords::ROWS)?;
        let columns = self.required_u32(keywords::COLUMNS)?;
        let number_of_frames = self.required_u32(keywords::NUMBER_OF_FRAMES)?;

        let segment_sequence = self
            .attributes
            .remove(keywords::SEGMENT_SEQUENCE)
            .ok_or_else(|| missing(keywords::SEGMENT_SEQUENCE))
            .and_then(SegmentSequence::from_value)?;

        let referenced_slices = match self.attributes.remove(keywords::REFERENCED_SLICES) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                SegError::Format(format!("malformed {}: {e}", keywords::REFERENCED_SLICES))
            })?,
            None => Vec::new(),
        };

        debug!(
            rows,
            columns,
            number_of_frames,
            segments = segment_sequence.len(),
            "normalized segmentation dataset"
        );
        Ok(SegmentationDataset {
            series_instance_uid,
            rows,
            columns,
            number_of_frames,
            segment_sequence,
            referenced_slices,
            pixel_data: self.pixel_data,
        })
    }

    fn required_u32(&self, keyword: &str) -> Result<u32> {
        let value = self.attributes.get(keyword).ok_or_else(|| missing(keyword))?;
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| SegError::Format(format!("{keyword} must be an unsigned integer, found {value}")))
    }
}

fn missing(keyword: &str) -> SegError {
    SegError::Format(format!("dataset has no {keyword} attribute"))
}

/// Encode a mask store straight into a dataset ready for a container.
pub fn export_segmentation(
    slices: &[SliceDescriptor],
    segments: &SparseSegmentList,
    tool_state: &ToolState,
    series_instance_uid: impl Into<String>,
) -> Result<SegmentationDataset> {
    let volume = encode(slices, segments, tool_state)?;
    SegmentationDataset::from_volume(&volume, series_instance_uid, slices.to_vec())
}

/// Decode `dataset` over the caller's ordered slice ids.
pub fn import_segmentation<S: AsRef<str>>(
    slice_ids: &[S],
    dataset: SegmentationDataset,
) -> Result<SegmentationImport> {
    let series_instance_uid = dataset.series_instance_uid.clone();
    let volume = dataset.into_volume(slice_ids.len())?;
    let decoded = decode(slice_ids, &volume)?;
    Ok(SegmentationImport {
        series_instance_uid,
        segments: decoded.catalog.to_records(),
        tool_state: decoded.tool_state,
    })
}
