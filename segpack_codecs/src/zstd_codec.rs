use std::io::Read;

use segpack_core::format::CODEC_ZSTD;
use segpack_core::{initial_capacity, PayloadCodec, Result, SegError};
use zstd::stream::read::Decoder;

/// Zstandard payload codec.
///
/// Best for: large, mostly-empty volumes where size matters more than
/// decode speed.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl PayloadCodec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(raw, self.level)
            .map_err(|e| SegError::Codec(format!("zstd compress error: {e}")))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let limit = (raw_len as u64).saturating_add(1);
        let mut raw = Vec::with_capacity(initial_capacity(raw_len));
        Decoder::with_buffer(stored)
            .and_then(|decoder| decoder.take(limit).read_to_end(&mut raw))
            .map_err(|e| SegError::Codec(format!("zstd decompress error: {e}")))?;
        Ok(raw)
    }
}
