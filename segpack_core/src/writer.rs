use std::io::Write;
use std::sync::Arc;

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::dataset::{keywords, SegmentationDataset};
use crate::error::{Result, SegError};
use crate::format::{Segp1Header, FLAG_HAS_CHECKSUM, FORMAT_VERSION};
use crate::payload::PayloadCodec;

/// Writer for SEGP1 files.
///
/// # Format layout written
/// ```text
/// [HEADER: 64 bytes]                 ← dims, codec id, lengths, checksum
/// [METADATA: JSON keyword attributes] ← everything except Rows/Columns/NumberOfFrames
/// [PAYLOAD: packed bits after the payload codec]
/// ```
/// The payload is compressed before anything is written, so the header can
/// go out first with its final values and no seek-back is needed.
pub struct Writer {
    codec: Arc<dyn PayloadCodec>,
    checksum: bool,
}

impl Writer {
    pub fn new(codec: Arc<dyn PayloadCodec>) -> Self {
        Self {
            codec,
            checksum: true,
        }
    }

    /// Skip the payload checksum (the flag bit stays clear).
    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn codec(&self) -> &dyn PayloadCodec {
        self.codec.as_ref()
    }

    /// Write `dataset` to `out`, returning the number of bytes written.
    pub fn write<W: Write>(&self, dataset: &SegmentationDataset, mut out: W) -> Result<u64> {
        let mut raw = dataset.to_raw()?;
        for key in [keywords::ROWS, keywords::COLUMNS, keywords::NUMBER_OF_FRAMES] {
            raw.attributes.remove(key);
        }
        let metadata = serde_json::to_vec(&raw.attributes)?;
        let stored = self.codec.compress(&raw.pixel_data)?;

        let header = Segp1Header {
            version: FORMAT_VERSION,
            payload_codec: self.codec.id(),
            rows: dataset.rows,
            columns: dataset.columns,
            frames: dataset.number_of_frames,
            flags: if self.checksum { FLAG_HAS_CHECKSUM } else { 0 },
            metadata_len: u32::try_from(metadata.len()).map_err(|_| {
                SegError::Format(format!("metadata block of {} bytes is too large", metadata.len()))
            })?,
            payload_len: stored.len() as u64,
            raw_payload_len: raw.pixel_data.len() as u64,
            payload_checksum: if self.checksum { xxh3_64(&stored) } else { 0 },
        };

        out.write_all(&header.to_bytes())?;
        out.write_all(&metadata)?;
        out.write_all(&stored)?;
        out.flush()?;

        debug!(
            codec = self.codec.name(),
            raw_payload = header.raw_payload_len,
            stored_payload = header.payload_len,
            metadata = metadata.len(),
            "wrote SEGP1 container"
        );
        Ok(header.file_len())
    }

    pub fn to_bytes(&self, dataset: &SegmentationDataset) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(dataset, &mut out)?;
        Ok(out)
    }
}
