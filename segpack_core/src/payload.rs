use crate::error::Result;

/// Upper bound on the output buffer a codec reserves up front. Larger
/// payloads still decode; the buffer grows as data arrives.
pub const PREALLOC_LIMIT: usize = 16 << 20;

/// Capacity to reserve for a payload whose header claims `raw_len` bytes.
#[inline]
pub fn initial_capacity(raw_len: usize) -> usize {
    raw_len.min(PREALLOC_LIMIT)
}

/// Compression applied to the packed bit buffer inside a SEGP1 file.
///
/// Each implementation:
/// - Is identified by a stable numeric `id()` stored in the SEGP1 header.
/// - Must reproduce the packed buffer byte for byte; the reader rejects any
///   decompressed length other than `raw_len`.
pub trait PayloadCodec: Send + Sync {
    /// Stable codec ID stored in the SEGP1 file header.
    fn id(&self) -> u16;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// `raw_len` is the packed length recorded in the header. Codecs should
    /// stop after `raw_len + 1` bytes and reserve at most
    /// [`initial_capacity`] up front.
    fn decompress(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>>;
}
