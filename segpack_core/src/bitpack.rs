//! One-bit-per-voxel packing.
//!
//! Bit order is LSB-first: voxel `i` is bit `i % 8` of byte `i / 8`, which is
//! how BINARY segmentations store their pixel data. Padding bits in the last
//! byte are always zero.

use crate::error::{Result, SegError};

/// Packed byte length for `voxels` voxels.
#[inline]
pub fn packed_len(voxels: usize) -> usize {
    voxels.div_ceil(8)
}

/// Pack a dense voxel array. Any non-zero voxel becomes a set bit.
pub fn pack(voxels: &[u8]) -> Vec<u8> {
    let mut packed = vec![0u8; packed_len(voxels.len())];
    pack_into(&mut packed, 0, voxels);
    packed
}

/// OR `voxels` into `packed` starting at voxel offset `bit_offset`.
///
/// `packed` must already be zeroed over the target range; bits are only ever
/// set, never cleared.
///
/// # Panics
/// Panics if the run extends past the end of `packed`.
pub fn pack_into(packed: &mut [u8], bit_offset: usize, voxels: &[u8]) {
    assert!(
        bit_offset + voxels.len() <= packed.len() * 8,
        "voxel run {}..{} exceeds packed capacity of {} voxels",
        bit_offset,
        bit_offset + voxels.len(),
        packed.len() * 8
    );

    let mut i = 0;
    // Leading voxels up to the first byte boundary.
    while i < voxels.len() && (bit_offset + i) % 8 != 0 {
        set_bit(packed, bit_offset + i, voxels[i]);
        i += 1;
    }
    // Whole bytes.
    while i + 8 <= voxels.len() {
        let mut byte = 0u8;
        for (bit, &v) in voxels[i..i + 8].iter().enumerate() {
            byte |= u8::from(v != 0) << bit;
        }
        packed[(bit_offset + i) / 8] |= byte;
        i += 8;
    }
    // Tail.
    while i < voxels.len() {
        set_bit(packed, bit_offset + i, voxels[i]);
        i += 1;
    }
}

#[inline]
fn set_bit(packed: &mut [u8], index: usize, voxel: u8) {
    packed[index / 8] |= u8::from(voxel != 0) << (index % 8);
}

/// Unpack `len` voxels from `packed` into a dense 0/1 array.
///
/// Fails when `packed` holds fewer than `packed_len(len)` bytes. Extra
/// trailing bytes are ignored; exact-length checks belong to the caller.
pub fn unpack(packed: &[u8], len: usize) -> Result<Vec<u8>> {
    let needed = packed_len(len);
    if packed.len() < needed {
        return Err(SegError::Format(format!(
            "packed buffer holds {} bytes but {} voxels need {}",
            packed.len(),
            len,
            needed
        )));
    }

    let mut voxels = Vec::with_capacity(len);
    for &byte in &packed[..len / 8] {
        for bit in 0..8 {
            voxels.push((byte >> bit) & 1);
        }
    }
    if len % 8 != 0 {
        let byte = packed[len / 8];
        for bit in 0..len % 8 {
            voxels.push((byte >> bit) & 1);
        }
    }
    Ok(voxels)
}
