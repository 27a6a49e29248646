//! Murmur64A hash implementation for Stingray resource names
//!
//! This is Austin Appleby's MurmurHash64A with a fixed seed of zero, the
//! function the engine uses to turn resource paths and type names into
//! lookup keys. The output is written to disk unmodified (container file
//! names are its hex encoding), so it must stay bit-exact.

/// Multiplier constant
const M: u64 = 0xc6a4_a793_5bd1_e995;

/// Shift constant used by the mixing steps
const R: u32 = 47;

/// Compute the 64-bit Murmur64A hash of `data` with seed 0
///
/// # Examples
///
/// ```
/// use stingray_hash::murmur::murmur64a;
///
/// assert_eq!(murmur64a(b"texture"), 0xcd42_38c6_a0c6_9e32);
/// ```
pub fn murmur64a(data: &[u8]) -> u64 {
    murmur64a_seeded(data, 0)
}

/// Compute Murmur64A with an explicit seed
pub fn murmur64a_seeded(data: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (data.len() as u64).wrapping_mul(M);

    let mut blocks = data.chunks_exact(8);
    for block in &mut blocks {
        let mut k = u64::from_le_bytes([
            block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
        ]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    // Fold 0-7 trailing bytes, highest first
    let tail = blocks.remainder();
    if !tail.is_empty() {
        for (i, byte) in tail.iter().enumerate().rev() {
            h ^= u64::from(*byte) << (8 * i);
        }
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}
