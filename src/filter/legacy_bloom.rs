//! Legacy cache-local Bloom filter.
//!
//! The bit array is divided into 64-byte lines and every probe for a key
//! lands in the same line. The line and the probe sequence both derive from
//! one 32-bit hash. Files written before format version 5 carry this
//! encoding, so the reader must stay forever; new tables only get it when a
//! policy pins it.
//!
//! Layout: `[bits: num_lines * line_size][num_probes: u8][num_lines: u32 LE]`.
//!
//! False positive rate: cache-local Bloom rate for `bits_per_key` and
//! `num_probes`, plus the 32-bit hash collision rate (see [`math`]).

use crate::error::{Error, Result};
use crate::filter::format::{CACHE_LINE_SIZE, METADATA_LEN};
use crate::filter::hash::bloom_hash;
use crate::filter::{math, FilterBitsBuilder, FilterBitsReader};
use bytes::{BufMut, Bytes};

const CACHE_LINE_BITS: usize = CACHE_LINE_SIZE * 8;

/// Largest line size a reader accepts, as a power of two.
const MAX_LOG2_CACHE_LINE_SIZE: u32 = 16;

/// Probe count for a whole number of bits per key, as `bits * ln(2)`.
pub fn choose_num_probes(whole_bits_per_key: u32) -> u32 {
    ((whole_bits_per_key as f64 * 0.69) as u32).clamp(1, 30)
}

/// Builds legacy cache-local Bloom filters.
#[derive(Debug, Clone)]
pub struct LegacyBloomBitsBuilder {
    bits_per_key: u32,
    num_probes: u32,
    num_added: usize,
    hash_entries: Vec<u32>,
}

impl LegacyBloomBitsBuilder {
    /// Creates a builder spending `whole_bits_per_key` bits per key.
    pub fn new(whole_bits_per_key: u32) -> Self {
        debug_assert!(whole_bits_per_key > 0);
        Self {
            bits_per_key: whole_bits_per_key,
            num_probes: choose_num_probes(whole_bits_per_key),
            num_added: 0,
            hash_entries: Vec::new(),
        }
    }

    /// Probes per key.
    pub fn num_probes(&self) -> u32 {
        self.num_probes
    }

    /// Returns `(bytes excluding trailer, num_lines)` for `num_entries` keys.
    fn layout(&self, num_entries: usize) -> (usize, u32) {
        if num_entries == 0 {
            return (0, 0);
        }
        let total_bits = num_entries.saturating_mul(self.bits_per_key as usize);
        let mut num_lines = total_bits.div_ceil(CACHE_LINE_BITS);
        // An odd line count lets more hash bits influence line selection.
        if num_lines % 2 == 0 {
            num_lines += 1;
        }
        (num_lines * CACHE_LINE_SIZE, num_lines as u32)
    }

    pub(crate) fn build(self) -> Bytes {
        let (len, num_lines) = self.layout(self.hash_entries.len());
        let mut data = vec![0u8; len];
        if num_lines > 0 {
            let log2_line = CACHE_LINE_SIZE.trailing_zeros();
            for &h in &self.hash_entries {
                add_hash(h, num_lines, self.num_probes, &mut data, log2_line);
            }
        }
        data.put_u8(self.num_probes as u8);
        data.put_u32_le(num_lines);
        Bytes::from(data)
    }
}

impl FilterBitsBuilder for LegacyBloomBitsBuilder {
    fn add_key(&mut self, key: &[u8]) {
        let hash = bloom_hash(key);
        self.num_added += 1;
        // Adjacent duplicates are common in sorted input; skipping them only
        // saves space.
        if self.hash_entries.last() != Some(&hash) {
            self.hash_entries.push(hash);
        }
    }

    fn num_added(&self) -> usize {
        self.num_added
    }

    fn calculate_space(&self, num_entries: usize) -> usize {
        self.layout(num_entries).0 + METADATA_LEN
    }

    fn estimated_fp_rate(&self, num_entries: usize, bytes: usize) -> f64 {
        estimated_fp_rate(num_entries, bytes.saturating_sub(METADATA_LEN), self.num_probes)
    }

    fn finish(self: Box<Self>) -> Bytes {
        (*self).build()
    }
}

/// Reads legacy cache-local Bloom filters of any line size.
#[derive(Debug, Clone)]
pub struct LegacyBloomBitsReader {
    data: Bytes,
    num_probes: u32,
    num_lines: u32,
    log2_cache_line_size: u32,
}

impl LegacyBloomBitsReader {
    /// Wraps `contents` whose trailer announced `num_probes` and `num_lines`.
    ///
    /// The line size is recovered from the length, so filters written with
    /// a different cache line size still decode.
    pub fn new(contents: &Bytes, num_probes: u32, num_lines: u32) -> Result<Self> {
        let len = contents.len().saturating_sub(METADATA_LEN);
        let lines = num_lines as usize;

        let log2_cache_line_size = if lines * CACHE_LINE_SIZE == len {
            CACHE_LINE_SIZE.trailing_zeros()
        } else if lines == 0 || len % lines != 0 || !(len / lines).is_power_of_two() {
            return Err(Error::corruption(format!(
                "legacy bloom filter of {} bytes cannot hold {} lines",
                len, num_lines
            )));
        } else {
            (len / lines).trailing_zeros()
        };
        if log2_cache_line_size > MAX_LOG2_CACHE_LINE_SIZE {
            return Err(Error::corruption(format!(
                "legacy bloom filter line of {} bytes is too large",
                len / lines
            )));
        }

        Ok(Self { data: contents.slice(..len), num_probes, num_lines, log2_cache_line_size })
    }

    /// Probes per key.
    pub fn num_probes(&self) -> u32 {
        self.num_probes
    }

    /// Cache line size the filter was written with.
    pub fn cache_line_size(&self) -> usize {
        1 << self.log2_cache_line_size
    }
}

impl FilterBitsReader for LegacyBloomBitsReader {
    fn may_match(&self, key: &[u8]) -> bool {
        hash_may_match(
            bloom_hash(key),
            self.num_lines,
            self.num_probes,
            &self.data,
            self.log2_cache_line_size,
        )
    }
}

/// Expected false positive rate for `bytes` of bit array over `num_entries` keys.
pub fn estimated_fp_rate(num_entries: usize, bytes: usize, num_probes: u32) -> f64 {
    if num_entries == 0 {
        return 0.0;
    }
    let bits_per_key = 8.0 * bytes as f64 / num_entries as f64;
    let filter_rate = math::cache_local_fp_rate(bits_per_key, num_probes, CACHE_LINE_BITS as u32);
    let fingerprint_rate = math::fingerprint_fp_rate(num_entries, 32);
    math::independent_probability_sum(filter_rate, fingerprint_rate)
}

fn add_hash(mut h: u32, num_lines: u32, num_probes: u32, data: &mut [u8], log2_line: u32) {
    let line_bit_mask = (1u32 << (log2_line + 3)) - 1;
    let base = ((h % num_lines) as usize) << log2_line;
    let delta = h.rotate_left(15);
    for _ in 0..num_probes {
        let bitpos = (h & line_bit_mask) as usize;
        data[base + bitpos / 8] |= 1 << (bitpos % 8);
        h = h.wrapping_add(delta);
    }
}

fn hash_may_match(
    mut h: u32,
    num_lines: u32,
    num_probes: u32,
    data: &[u8],
    log2_line: u32,
) -> bool {
    let line_bit_mask = (1u32 << (log2_line + 3)) - 1;
    let base = ((h % num_lines) as usize) << log2_line;
    let delta = h.rotate_left(15);
    for _ in 0..num_probes {
        let bitpos = (h & line_bit_mask) as usize;
        if data[base + bitpos / 8] & (1 << (bitpos % 8)) == 0 {
            return false;
        }
        h = h.wrapping_add(delta);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::format::FilterMetadata;

    fn build(keys: &[&[u8]], bits_per_key: u32) -> Bytes {
        let mut builder = Box::new(LegacyBloomBitsBuilder::new(bits_per_key));
        for key in keys {
            builder.add_key(key);
        }
        builder.finish()
    }

    fn reader(contents: &Bytes) -> LegacyBloomBitsReader {
        match FilterMetadata::parse(contents).unwrap() {
            FilterMetadata::LegacyBloom { num_probes, num_lines } => {
                LegacyBloomBitsReader::new(contents, num_probes, num_lines).unwrap()
            }
            other => panic!("unexpected metadata {:?}", other),
        }
    }

    #[test]
    fn test_choose_num_probes() {
        assert_eq!(choose_num_probes(1), 1);
        assert_eq!(choose_num_probes(10), 6);
        assert_eq!(choose_num_probes(20), 13);
        assert_eq!(choose_num_probes(100), 30);
    }

    #[test]
    fn test_layout_uses_odd_line_count() {
        let builder = LegacyBloomBitsBuilder::new(10);
        assert_eq!(builder.calculate_space(0), METADATA_LEN);
        // 100 keys * 10 bits = 1000 bits -> 2 lines -> rounded up to 3.
        assert_eq!(builder.calculate_space(100), 3 * CACHE_LINE_SIZE + METADATA_LEN);
        // 1 key still needs a full line.
        assert_eq!(builder.calculate_space(1), CACHE_LINE_SIZE + METADATA_LEN);
    }

    #[test]
    fn test_no_false_negatives() {
        let keys: Vec<Vec<u8>> = (0..1000).map(|i| format!("key{}", i).into_bytes()).collect();
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let contents = build(&refs, 10);
        let reader = reader(&contents);

        assert_eq!(reader.num_probes(), 6);
        assert_eq!(reader.cache_line_size(), CACHE_LINE_SIZE);
        for key in &keys {
            assert!(reader.may_match(key), "false negative for {:?}", key);
        }
    }

    #[test]
    fn test_trailer_layout() {
        let contents = build(&[b"x"], 10);
        assert_eq!(contents.len(), CACHE_LINE_SIZE + METADATA_LEN);
        assert_eq!(contents[CACHE_LINE_SIZE], 6);
        assert_eq!(&contents[CACHE_LINE_SIZE + 1..], &1u32.to_le_bytes());
    }

    #[test]
    fn test_duplicates_do_not_grow_filter() {
        let mut builder = LegacyBloomBitsBuilder::new(10);
        for _ in 0..100 {
            builder.add_key(b"same");
        }
        assert_eq!(builder.num_added(), 100);
        let contents = Box::new(builder).finish();
        assert_eq!(contents.len(), CACHE_LINE_SIZE + METADATA_LEN);
        assert!(reader(&contents).may_match(b"same"));
    }

    #[test]
    fn test_reads_other_cache_line_sizes() {
        // Same filter as written on a machine with 128-byte cache lines.
        let mut data = vec![0u8; 3 * 128];
        let h = bloom_hash(b"wide");
        add_hash(h, 3, 6, &mut data, 7);
        data.put_u8(6);
        data.put_u32_le(3);
        let contents = Bytes::from(data);

        let reader = reader(&contents);
        assert_eq!(reader.cache_line_size(), 128);
        assert!(reader.may_match(b"wide"));
    }

    #[test]
    fn test_inconsistent_line_count_is_corruption() {
        let mut data = vec![0u8; 100];
        data.put_u8(6);
        data.put_u32_le(3);
        let contents = Bytes::from(data);
        let err = LegacyBloomBitsReader::new(&contents, 6, 3).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));

        let mut data = vec![0u8; 64];
        data.put_u8(6);
        data.put_u32_le(0);
        let contents = Bytes::from(data);
        assert!(LegacyBloomBitsReader::new(&contents, 6, 0).is_err());
    }

    #[test]
    fn test_oversized_line_is_corruption() {
        // One line of 2^17 bytes: a power of two, but no real cache line.
        let mut data = vec![0u8; 1 << 17];
        data.put_u8(6);
        data.put_u32_le(1);
        let contents = Bytes::from(data);
        let err = LegacyBloomBitsReader::new(&contents, 6, 1).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));

        let mut data = vec![0u8; 1 << 16];
        data.put_u8(6);
        data.put_u32_le(1);
        let contents = Bytes::from(data);
        let reader = LegacyBloomBitsReader::new(&contents, 6, 1).unwrap();
        assert_eq!(reader.cache_line_size(), 1 << 16);
    }

    #[test]
    fn test_estimated_fp_rate() {
        let builder = LegacyBloomBitsBuilder::new(10);
        let bytes = builder.calculate_space(10000);
        let rate = builder.estimated_fp_rate(10000, bytes);
        assert!(rate > 0.005 && rate < 0.015, "rate = {}", rate);
        assert_eq!(builder.estimated_fp_rate(0, bytes), 0.0);
    }
}
