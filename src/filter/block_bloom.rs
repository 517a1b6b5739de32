//! Deprecated block-based Bloom filter.
//!
//! One small filter per data block, built in a single call from all of the
//! block's keys. Probes are spread over the whole bit array rather than one
//! cache line, and the only metadata is the trailing probe count. These
//! bytes carry no marker the builder/reader path recognises, so they must
//! only be read back with [`key_may_match`].
//!
//! Layout: `[bits: max(64, n * bits_per_key) rounded up to bytes][num_probes: u8]`.
//!
//! False positive rate: the standard Bloom rate for `bits_per_key` and
//! `num_probes`.

use crate::filter::format::MAX_NUM_PROBES;
use crate::filter::hash::bloom_hash;
use bytes::{BufMut, BytesMut};

/// Short filters get a floor on their size to keep the false positive
/// rate in check.
const MIN_FILTER_BITS: usize = 64;

/// Appends a filter over `keys` to `dst`.
pub fn create_filter(keys: &[&[u8]], whole_bits_per_key: u32, num_probes: u32, dst: &mut BytesMut) {
    debug_assert!((1..=MAX_NUM_PROBES).contains(&num_probes));
    let bits = (keys.len() * whole_bits_per_key as usize).max(MIN_FILTER_BITS);
    let bytes = bits.div_ceil(8);
    let bits = bytes * 8;

    let start = dst.len();
    dst.put_bytes(0, bytes);
    dst.put_u8(num_probes as u8);

    let array = &mut dst[start..start + bytes];
    for key in keys {
        let mut h = bloom_hash(key);
        let delta = h.rotate_left(15);
        for _ in 0..num_probes {
            let bitpos = h as usize % bits;
            array[bitpos / 8] |= 1 << (bitpos % 8);
            h = h.wrapping_add(delta);
        }
    }
}

/// Queries a filter produced by [`create_filter`].
pub fn key_may_match(key: &[u8], filter: &[u8]) -> bool {
    let len = filter.len();
    if len < 2 {
        return false;
    }
    let array = &filter[..len - 1];
    let bits = array.len() * 8;

    // Use the stored probe count; the filter may predate a config change.
    let k = filter[len - 1] as u32;
    if k > MAX_NUM_PROBES {
        // Reserved for newer encodings of short filters. Consider it a match.
        return true;
    }

    let mut h = bloom_hash(key);
    let delta = h.rotate_left(15);
    for _ in 0..k {
        let bitpos = h as usize % bits;
        if array[bitpos / 8] & (1 << (bitpos % 8)) == 0 {
            return false;
        }
        h = h.wrapping_add(delta);
    }
    true
}
