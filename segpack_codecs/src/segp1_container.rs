use std::sync::Arc;

use segpack_core::{
    ContainerIo, PayloadCodec, RawDataset, Reader, Result, SegmentationDataset, Writer,
};
use tracing::debug;

use crate::payload_codec_by_id;

/// Adapter for binary SEGP1 files.
///
/// Reading picks the payload codec from the file header, so any bundled
/// codec can be opened; writing always uses the configured one.
pub struct Segp1Container {
    codec: Arc<dyn PayloadCodec>,
    checksum: bool,
}

impl Segp1Container {
    pub fn new(codec: Arc<dyn PayloadCodec>) -> Self {
        Self {
            codec,
            checksum: true,
        }
    }

    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn codec(&self) -> &dyn PayloadCodec {
        self.codec.as_ref()
    }
}

impl ContainerIo for Segp1Container {
    fn name(&self) -> &'static str {
        "segp1"
    }

    fn read_container(&self, bytes: &[u8]) -> Result<RawDataset> {
        let reader = Reader::new(bytes)?;
        let codec = payload_codec_by_id(reader.header.payload_codec)?;
        debug!(
            codec = codec.name(),
            stored_payload = reader.header.payload_len,
            "reading SEGP1 container"
        );
        reader.into_raw(codec.as_ref())
    }

    fn serialize_dataset(&self, dataset: &SegmentationDataset) -> Result<Vec<u8>> {
        let writer = Writer::new(Arc::clone(&self.codec));
        let writer = if self.checksum {
            writer
        } else {
            writer.without_checksum()
        };
        writer.to_bytes(dataset)
    }
}
