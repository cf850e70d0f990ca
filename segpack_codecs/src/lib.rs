mod deflate_codec;
mod json_container;
mod lz4_codec;
mod passthrough;
mod segp1_container;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use json_container::{is_json, JsonContainer};
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use segp1_container::Segp1Container;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use segpack_core::format::{is_segp1, CODEC_DEFLATE, CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_ZSTD};
use segpack_core::{ContainerIo, PayloadCodec, Result, SegError};

/// Resolve a payload codec from its on-disk `payload_codec` id.
///
/// Called when opening an existing SEGP1 file, so the reader can be
/// initialized with the right codec automatically.
pub fn payload_codec_by_id(id: u16) -> Result<Arc<dyn PayloadCodec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassThroughCodec)),
        CODEC_DEFLATE => Ok(Arc::new(DeflateCodec::default())),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        _ => Err(SegError::Format(format!(
            "unknown payload codec id {id}; supported: 0 (passthrough), 1 (deflate), 2 (zstd), 3 (lz4)"
        ))),
    }
}

/// Pick the container adapter for `bytes` by sniffing its first bytes.
pub fn detect_container(bytes: &[u8]) -> Result<Box<dyn ContainerIo>> {
    if is_segp1(bytes) {
        Ok(Box::new(Segp1Container::new(Arc::new(PassThroughCodec))))
    } else if is_json(bytes) {
        Ok(Box::new(JsonContainer::new()))
    } else {
        Err(SegError::Format(
            "unrecognized container: neither SEGP1 magic nor a JSON object".into(),
        ))
    }
}
