use serde_json::{Map, Value};
use xxhash_rust::xxh3::xxh3_64;

use crate::dataset::{keywords, RawDataset};
use crate::error::{Result, SegError};
use crate::format::{Segp1Header, FLAG_HAS_CHECKSUM, FORMAT_VERSION, HEADER_SIZE};
use crate::payload::PayloadCodec;

/// Reader over an in-memory SEGP1 file.
///
/// # Open sequence
/// 1. Parse the 64-byte header (magic check, version, lengths).
/// 2. Check that the buffer holds exactly header + metadata + payload.
/// 3. Borrow the metadata and payload sections without copying.
///
/// The payload is only decompressed by [`Reader::payload`], which is also
/// where the checksum and codec id are verified.
pub struct Reader<'a> {
    pub header: Segp1Header,
    metadata: &'a [u8],
    stored: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let head: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| {
                SegError::Format(format!(
                    "file is {} bytes, shorter than the {HEADER_SIZE}-byte SEGP1 header",
                    bytes.len()
                ))
            })?;
        let header = Segp1Header::from_bytes(head)
            .ok_or_else(|| SegError::Format("invalid SEGP magic bytes: not a SEGP1 file".into()))?;

        if header.version != FORMAT_VERSION {
            return Err(SegError::Format(format!(
                "unsupported SEGP version {} (only version {FORMAT_VERSION} is supported)",
                header.version
            )));
        }
        if header.file_len() != bytes.len() as u64 {
            return Err(SegError::Format(format!(
                "header describes {} bytes but the file is {} bytes",
                header.file_len(),
                bytes.len()
            )));
        }

        let metadata_end = HEADER_SIZE + header.metadata_len as usize;
        Ok(Self {
            metadata: &bytes[HEADER_SIZE..metadata_end],
            stored: &bytes[metadata_end..],
            header,
        })
    }

    /// Keyword attributes from the metadata block plus the header dims.
    pub fn attributes(&self) -> Result<Map<String, Value>> {
        let mut attributes = match serde_json::from_slice::<Value>(self.metadata) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(SegError::Format("metadata block is not a JSON object".into())),
            Err(e) => return Err(SegError::Format(format!("metadata block is not valid JSON: {e}"))),
        };
        attributes.insert(keywords::ROWS.into(), Value::from(self.header.rows));
        attributes.insert(keywords::COLUMNS.into(), Value::from(self.header.columns));
        attributes.insert(
            keywords::NUMBER_OF_FRAMES.into(),
            Value::from(self.header.frames),
        );
        Ok(attributes)
    }

    /// Stored payload bytes, still compressed.
    pub fn stored_payload(&self) -> &'a [u8] {
        self.stored
    }

    /// Compression ratio (packed / stored).
    pub fn ratio(&self) -> f64 {
        if self.header.payload_len == 0 {
            return 1.0;
        }
        self.header.raw_payload_len as f64 / self.header.payload_len as f64
    }

    /// Verify and decompress the payload back to the packed bit buffer.
    pub fn payload(&self, codec: &dyn PayloadCodec) -> Result<Vec<u8>> {
        if self.header.payload_codec != codec.id() {
            return Err(SegError::Format(format!(
                "codec mismatch: file uses payload codec {} but provided codec has id {}",
                self.header.payload_codec,
                codec.id()
            )));
        }

        let expected = self.expected_raw_len()?;
        if self.header.raw_payload_len != expected {
            return Err(SegError::Format(format!(
                "header records a {}-byte packed payload but {}x{}x{} frames pack into {}",
                self.header.raw_payload_len,
                self.header.columns,
                self.header.rows,
                self.header.frames,
                expected
            )));
        }

        if self.header.has_flag(FLAG_HAS_CHECKSUM) {
            let actual = xxh3_64(self.stored);
            if actual != self.header.payload_checksum {
                return Err(SegError::ChecksumMismatch {
                    expected: self.header.payload_checksum,
                    actual,
                });
            }
        }

        let raw_len = usize::try_from(self.header.raw_payload_len).map_err(|_| {
            SegError::Format(format!(
                "payload of {} bytes does not fit in memory",
                self.header.raw_payload_len
            ))
        })?;
        let raw = codec.decompress(self.stored, raw_len)?;
        if raw.len() != raw_len {
            return Err(SegError::Format(format!(
                "payload decompressed to {} bytes but header says {}",
                raw.len(),
                raw_len
            )));
        }
        Ok(raw)
    }

    /// Packed length implied by the header dims, `ceil(rows * columns * frames / 8)`.
    fn expected_raw_len(&self) -> Result<u64> {
        let header = &self.header;
        u64::from(header.rows)
            .checked_mul(u64::from(header.columns))
            .and_then(|xy| xy.checked_mul(u64::from(header.frames)))
            .map(|voxels| voxels.div_ceil(8))
            .ok_or_else(|| {
                SegError::Format(format!(
                    "{}x{}x{} frames are too large to address",
                    header.columns, header.rows, header.frames
                ))
            })
    }

    pub fn into_raw(self, codec: &dyn PayloadCodec) -> Result<RawDataset> {
        Ok(RawDataset {
            attributes: self.attributes()?,
            pixel_data: self.payload(codec)?,
        })
    }
}
