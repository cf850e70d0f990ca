/// Magic bytes for SEGP version 1 files: "SEGP1\n" followed by 2 null bytes.
pub const MAGIC: &[u8; 8] = b"SEGP1\n\x00\x00";

pub const FORMAT_VERSION: u16 = 1;

/// Fixed size of the SEGP1 file header in bytes.
///   magic[8] + version:u16 + payload_codec:u16 + rows:u32 + columns:u32
///   + frames:u32 + flags:u32 + metadata_len:u32 + payload_len:u64
///   + raw_payload_len:u64 + payload_checksum:u64 + reserved[8]
///   = 8 + 2 + 2 + 4 + 4 + 4 + 4 + 4 + 8 + 8 + 8 + 8 = 64
pub const HEADER_SIZE: usize = 64;

// ── Flags ──────────────────────────────────────────────────────────────────

/// The payload carries an xxhash3-64 checksum of its stored bytes.
pub const FLAG_HAS_CHECKSUM: u32 = 1 << 0;

// ── Payload codec IDs ──────────────────────────────────────────────────────

pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_DEFLATE: u16 = 1;
pub const CODEC_ZSTD: u16 = 2;
pub const CODEC_LZ4: u16 = 3;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 64-byte SEGP1 file header.
///
/// File layout:
/// ```text
/// [HEADER: 64 bytes]
/// [METADATA: metadata_len bytes of JSON keyword attributes]
/// [PAYLOAD: payload_len bytes, the packed bits after the payload codec]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segp1Header {
    pub version: u16,
    pub payload_codec: u16,
    pub rows: u32,
    pub columns: u32,
    pub frames: u32,
    pub flags: u32,
    pub metadata_len: u32,
    /// Stored (codec output) payload length.
    pub payload_len: u64,
    /// Packed bit buffer length before the payload codec.
    pub raw_payload_len: u64,
    pub payload_checksum: u64,
}

impl Segp1Header {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.payload_codec.to_le_bytes());
        buf[12..16].copy_from_slice(&self.rows.to_le_bytes());
        buf[16..20].copy_from_slice(&self.columns.to_le_bytes());
        buf[20..24].copy_from_slice(&self.frames.to_le_bytes());
        buf[24..28].copy_from_slice(&self.flags.to_le_bytes());
        buf[28..32].copy_from_slice(&self.metadata_len.to_le_bytes());
        buf[32..40].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[40..48].copy_from_slice(&self.raw_payload_len.to_le_bytes());
        buf[48..56].copy_from_slice(&self.payload_checksum.to_le_bytes());
        // reserved[8] stays zero
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        if &buf[..8] != MAGIC {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([buf[8], buf[9]]),
            payload_codec: u16::from_le_bytes([buf[10], buf[11]]),
            rows: u32::from_le_bytes(le4(buf, 12)),
            columns: u32::from_le_bytes(le4(buf, 16)),
            frames: u32::from_le_bytes(le4(buf, 20)),
            flags: u32::from_le_bytes(le4(buf, 24)),
            metadata_len: u32::from_le_bytes(le4(buf, 28)),
            payload_len: u64::from_le_bytes(le8(buf, 32)),
            raw_payload_len: u64::from_le_bytes(le8(buf, 40)),
            payload_checksum: u64::from_le_bytes(le8(buf, 48)),
        })
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Total file length this header describes.
    pub fn file_len(&self) -> u64 {
        (HEADER_SIZE as u64 + self.metadata_len as u64).saturating_add(self.payload_len)
    }
}

fn le4(buf: &[u8], at: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[at..at + 4]);
    out
}

fn le8(buf: &[u8], at: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[at..at + 8]);
    out
}

/// True when `bytes` starts with the SEGP1 magic.
pub fn is_segp1(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}
