use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use segpack_core::format::CODEC_LZ4;
use segpack_core::{PayloadCodec, Result, SegError};

/// LZ4 block with a little-endian `u32` size prefix.
///
/// The prefix must agree with the header's packed length before anything
/// is allocated for the output.
pub struct Lz4Codec;

impl PayloadCodec for Lz4Codec {
    fn id(&self) -> u16 {
        CODEC_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let prefix: [u8; 4] = stored
            .get(..4)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| SegError::Codec("lz4 block is missing its size prefix".into()))?;
        let declared = u32::from_le_bytes(prefix) as usize;
        if declared != raw_len {
            return Err(SegError::Codec(format!(
                "lz4 block declares {declared} bytes but the header expects {raw_len}"
            )));
        }
        decompress_size_prepended(stored)
            .map_err(|e| SegError::Codec(format!("lz4 decompress error: {e}")))
    }
}
