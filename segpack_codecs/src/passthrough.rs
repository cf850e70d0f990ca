use segpack_core::format::CODEC_PASSTHROUGH;
use segpack_core::{PayloadCodec, Result};

/// Stores the bit-packed frames uncompressed, so the SEGP1 payload is the
/// same byte run a BINARY segmentation carries as pixel data.
pub struct PassThroughCodec;

impl PayloadCodec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, stored: &[u8], _raw_len: usize) -> Result<Vec<u8>> {
        Ok(stored.to_vec())
    }
}
