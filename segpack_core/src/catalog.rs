//! Segment metadata: the sparse slot list kept by the annotation tool, the
//! persisted segment sequence, and the dense catalog that connects them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SegError};

/// Stable segment identifier: the slot position in a [`SparseSegmentList`].
pub type SegmentId = u32;

/// A coded concept triple (`CodeValue`, `CodingSchemeDesignator`, `CodeMeaning`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedConcept {
    #[serde(rename = "CodeValue")]
    pub code_value: String,
    #[serde(rename = "CodingSchemeDesignator")]
    pub coding_scheme_designator: String,
    #[serde(rename = "CodeMeaning")]
    pub code_meaning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmType {
    #[default]
    Manual,
    Semiautomatic,
    Automatic,
}

/// Descriptive metadata for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    #[serde(rename = "SegmentLabel")]
    pub label: String,
    #[serde(rename = "SegmentAlgorithmType", default)]
    pub algorithm_type: AlgorithmType,
    #[serde(
        rename = "SegmentAlgorithmName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub algorithm_name: Option<String>,
    #[serde(
        rename = "RecommendedDisplayCIELabValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub recommended_display_cielab: Option<[u16; 3]>,
    #[serde(
        rename = "SegmentedPropertyCategoryCodeSequence",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<CodedConcept>,
    #[serde(
        rename = "SegmentedPropertyTypeCodeSequence",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub property_type: Option<CodedConcept>,
}

impl SegmentDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// One slot of the sparse segment list. Serialized as `null` when empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    from = "Option<SegmentDescriptor>",
    into = "Option<SegmentDescriptor>"
)]
pub enum SegmentSlot {
    #[default]
    Empty,
    Present(SegmentDescriptor),
}

impl From<Option<SegmentDescriptor>> for SegmentSlot {
    fn from(value: Option<SegmentDescriptor>) -> Self {
        match value {
            Some(descriptor) => SegmentSlot::Present(descriptor),
            None => SegmentSlot::Empty,
        }
    }
}

impl From<SegmentSlot> for Option<SegmentDescriptor> {
    fn from(slot: SegmentSlot) -> Self {
        match slot {
            SegmentSlot::Present(descriptor) => Some(descriptor),
            SegmentSlot::Empty => None,
        }
    }
}

/// Segment slots indexed by [`SegmentId`]. Removed segments leave an
/// [`SegmentSlot::Empty`] hole so that the ids of later segments stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseSegmentList {
    slots: Vec<SegmentSlot>,
}

impl SparseSegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: Vec<SegmentSlot>) -> Self {
        Self { slots }
    }

    /// Append a segment in the next free id and return that id.
    pub fn push(&mut self, descriptor: SegmentDescriptor) -> Result<SegmentId> {
        let id = SegmentId::try_from(self.slots.len()).map_err(|_| {
            SegError::Format(format!("segment list already holds {} slots", self.slots.len()))
        })?;
        self.slots.push(SegmentSlot::Present(descriptor));
        Ok(id)
    }

    /// Store `descriptor` at `id`, padding with holes as needed.
    pub fn insert(&mut self, id: SegmentId, descriptor: SegmentDescriptor) {
        let index = id as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, SegmentSlot::Empty);
        }
        self.slots[index] = SegmentSlot::Present(descriptor);
    }

    /// Turn slot `id` into a hole, returning what it held.
    pub fn remove(&mut self, id: SegmentId) -> Option<SegmentDescriptor> {
        self.slots
            .get_mut(id as usize)
            .and_then(|slot| Option::<SegmentDescriptor>::from(std::mem::take(slot)))
    }

    pub fn get(&self, id: SegmentId) -> Option<&SegmentDescriptor> {
        match self.slots.get(id as usize) {
            Some(SegmentSlot::Present(descriptor)) => Some(descriptor),
            _ => None,
        }
    }

    /// Number of slots, holes included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SegmentSlot] {
        &self.slots
    }

    /// Occupied slots in ascending id order.
    pub fn occupied(&self) -> impl Iterator<Item = (SegmentId, &SegmentDescriptor)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                SegmentSlot::Present(descriptor) => Some((index as SegmentId, descriptor)),
                SegmentSlot::Empty => None,
            })
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied().count()
    }
}

/// Persisted form of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// 1-based position among the active segments.
    #[serde(rename = "SegmentNumber")]
    pub segment_number: u32,
    /// Slot id in the source list. Absent in containers written elsewhere.
    #[serde(rename = "SegmentId", default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<SegmentId>,
    #[serde(flatten)]
    pub descriptor: SegmentDescriptor,
}

/// Segment metadata as a container stores it: one record alone, or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentSequence {
    Many(Vec<SegmentRecord>),
    Single(SegmentRecord),
}

impl SegmentSequence {
    /// Normalize a raw attribute value (an object or an array of objects).
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    serde_json::from_value(item).map_err(|e| {
                        SegError::Format(format!("malformed segment sequence item {i}: {e}"))
                    })
                })
                .collect::<Result<Vec<SegmentRecord>>>()
                .map(SegmentSequence::Many),
            Value::Object(_) => serde_json::from_value(value)
                .map(SegmentSequence::Single)
                .map_err(|e| SegError::Format(format!("malformed segment sequence item: {e}"))),
            other => Err(SegError::Format(format!(
                "segment sequence must be an object or an array, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn records(&self) -> &[SegmentRecord] {
        match self {
            SegmentSequence::Many(records) => records,
            SegmentSequence::Single(record) => std::slice::from_ref(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Position among the active segments; selects the segment block in the
    /// packed volume.
    pub dense_index: usize,
    pub segment_id: SegmentId,
    pub descriptor: SegmentDescriptor,
}

/// Dense, ordered view of the active segments. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCatalog {
    entries: Vec<CatalogEntry>,
}

impl SegmentCatalog {
    /// Number the occupied slots of `list` densely, skipping holes.
    pub fn from_sparse(list: &SparseSegmentList) -> Result<Self> {
        let entries: Vec<CatalogEntry> = list
            .occupied()
            .enumerate()
            .map(|(dense_index, (segment_id, descriptor))| CatalogEntry {
                dense_index,
                segment_id,
                descriptor: descriptor.clone(),
            })
            .collect();

        if entries.is_empty() {
            return Err(SegError::EmptySegmentation);
        }
        Ok(Self { entries })
    }

    /// Rebuild the catalog from persisted metadata.
    ///
    /// Records without a stored slot id take their position as id.
    pub fn from_sequence(sequence: &SegmentSequence) -> Result<Self> {
        let records = sequence.records();
        if records.is_empty() {
            return Err(SegError::Format("segment sequence is empty".into()));
        }

        let mut entries: Vec<CatalogEntry> = Vec::with_capacity(records.len());
        for (dense_index, record) in records.iter().enumerate() {
            let segment_id = match record.segment_id {
                Some(id) => id,
                None => SegmentId::try_from(dense_index).map_err(|_| {
                    SegError::Format(format!("segment position {dense_index} exceeds id range"))
                })?,
            };
            if let Some(prev) = entries.last() {
                if segment_id <= prev.segment_id {
                    return Err(SegError::Format(format!(
                        "segment ids must be strictly ascending: {} follows {}",
                        segment_id, prev.segment_id
                    )));
                }
            }
            entries.push(CatalogEntry {
                dense_index,
                segment_id,
                descriptor: record.descriptor.clone(),
            });
        }
        Ok(Self { entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// False for any catalog built by `from_sparse` or `from_sequence`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    pub fn dense_index_of(&self, segment_id: SegmentId) -> Option<usize> {
        self.entries
            .binary_search_by_key(&segment_id, |entry| entry.segment_id)
            .ok()
    }

    pub fn descriptors(&self) -> Vec<SegmentDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn to_records(&self) -> Vec<SegmentRecord> {
        self.entries
            .iter()
            .map(|entry| SegmentRecord {
                segment_number: entry.dense_index as u32 + 1,
                segment_id: Some(entry.segment_id),
                descriptor: entry.descriptor.clone(),
            })
            .collect()
    }

    /// Persisted shape: a lone record for one segment, a list otherwise.
    pub fn to_sequence(&self) -> SegmentSequence {
        let mut records = self.to_records();
        if records.len() == 1 {
            SegmentSequence::Single(records.remove(0))
        } else {
            SegmentSequence::Many(records)
        }
    }
}

impl<'a> IntoIterator for &'a SegmentCatalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
