use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use segpack_core::format::CODEC_DEFLATE;
use segpack_core::{initial_capacity, PayloadCodec, Result, SegError};

/// Raw deflate (RFC 1951), the same stream format as the deflated transfer
/// syntax. Slower than lz4, but readable by any zlib.
pub struct DeflateCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl PayloadCodec for DeflateCodec {
    fn id(&self) -> u16 {
        CODEC_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(self.level));
        encoder
            .write_all(raw)
            .and_then(|_| encoder.finish())
            .map_err(|e| SegError::Codec(format!("deflate compress error: {e}")))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        // One byte past `raw_len` is enough for the reader to see an overrun.
        let limit = (raw_len as u64).saturating_add(1);
        let mut raw = Vec::with_capacity(initial_capacity(raw_len));
        DeflateDecoder::new(stored)
            .take(limit)
            .read_to_end(&mut raw)
            .map_err(|e| SegError::Codec(format!("deflate decompress error: {e}")))?;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_stops_just_past_raw_len() {
        let codec = DeflateCodec::default();
        let stored = codec.compress(&[0xaa; 4096]).unwrap();
        assert_eq!(codec.decompress(&stored, 4096).unwrap().len(), 4096);
        assert_eq!(codec.decompress(&stored, 10).unwrap().len(), 11);
    }

    #[test]
    fn test_huge_raw_len_does_not_preallocate() {
        let codec = DeflateCodec::default();
        let stored = codec.compress(&[1, 2, 3]).unwrap();
        assert_eq!(codec.decompress(&stored, usize::MAX).unwrap(), vec![1, 2, 3]);
    }
}
