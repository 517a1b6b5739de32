//! Key hashing shared by the builtin filter encodings.
//!
//! Hash values are part of the persisted filter format: changing either
//! function makes every existing filter report false negatives.

use std::hash::Hasher;

/// Seed for the 32-bit hash used by the legacy and block-based encodings.
const BLOOM_HASH_SEED: u32 = 0xbc9f1d34;

/// Seed for the 64-bit hash used by the cache-local encoding.
const BLOOM_HASH64_SEED: u32 = 0;

/// Returns the 32-bit filter hash of `key`.
pub(crate) fn bloom_hash(key: &[u8]) -> u32 {
    hash_with_seed(key, BLOOM_HASH_SEED) as u32
}

/// Returns the 64-bit filter hash of `key`.
pub(crate) fn bloom_hash64(key: &[u8]) -> u64 {
    hash_with_seed(key, BLOOM_HASH64_SEED)
}

fn hash_with_seed(key: &[u8], seed: u32) -> u64 {
    let mut hasher = FnvHasher::new_with_seed(seed);
    // Write the raw bytes; `Hash for [u8]` would add a length prefix.
    hasher.write(key);
    hasher.finish()
}

/// Seeded FNV-1a with a 64-bit finalizer so every output bit depends on
/// every input byte.
struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    fn new_with_seed(seed: u32) -> Self {
        Self { state: Self::FNV_OFFSET_BASIS ^ (seed as u64) }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        let mut k = self.state;
        k ^= k >> 33;
        k = k.wrapping_mul(0xff51afd7ed558ccd);
        k ^= k >> 33;
        k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
        k ^= k >> 33;
        k
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}
