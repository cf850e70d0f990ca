use thiserror::Error;

/// Error type for segmentation codec and container operations.
#[derive(Debug, Error)]
pub enum SegError {
    /// The segment list has no occupied slot, so there is nothing to encode.
    #[error("segmentation has no segments: every slot in the segment list is empty")]
    EmptySegmentation,
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("payload checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    ChecksumMismatch { expected: u64, actual: u64 },
    #[error("payload codec error: {0}")]
    Codec(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = SegError> = std::result::Result<T, E>;
