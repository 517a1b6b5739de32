//! Cache-local Bloom filter with 64-bit hashing, the current encoding.
//!
//! The lower 32 bits of the key hash pick a 64-byte line; the upper 32 bits
//! drive the probes inside it. Each probe takes a 9-bit address from the top
//! of a running product with the golden ratio constant. Requires format
//! version 5.
//!
//! Layout: `[bits: k * 64][0xFF][sub_impl = 0][block_and_probes][0][0]`.
//!
//! False positive rate: cache-local Bloom rate for the configured bits per
//! key and [`choose_num_probes`], plus the (negligible) 64-bit hash
//! collision rate.

use crate::error::{Error, Result};
use crate::filter::format::{new_impl_trailer, SubImpl, CACHE_LINE_SIZE, METADATA_LEN};
use crate::filter::hash::bloom_hash64;
use crate::filter::{math, FilterBitsBuilder, FilterBitsReader};
use bytes::Bytes;

const PROBE_MULTIPLIER: u32 = 0x9e3779b9;

/// Probe count giving the lowest false positive rate for this encoding at
/// `millibits_per_key` (thousandths of a bit per key).
pub fn choose_num_probes(millibits_per_key: u32) -> u32 {
    match millibits_per_key {
        0..=2080 => 1,
        2081..=3580 => 2,
        3581..=5100 => 3,
        5101..=6640 => 4,
        6641..=8300 => 5,
        8301..=10070 => 6,
        10071..=11720 => 7,
        11721..=14001 => 8,
        14002..=16050 => 9,
        16051..=18300 => 10,
        18301..=22001 => 11,
        22002..=25501 => 12,
        25502..=50000 => ((millibits_per_key - 1) / 2000 - 1).max(12),
        _ => 24,
    }
}

/// Builds cache-local Bloom filters.
#[derive(Debug, Clone)]
pub struct FastLocalBloomBitsBuilder {
    millibits_per_key: u32,
    num_probes: u32,
    num_added: usize,
    hash_entries: Vec<u64>,
}

impl FastLocalBloomBitsBuilder {
    /// Creates a builder spending `millibits_per_key / 1000` bits per key.
    pub fn new(millibits_per_key: u32) -> Self {
        debug_assert!(millibits_per_key > 0);
        Self {
            millibits_per_key,
            num_probes: choose_num_probes(millibits_per_key),
            num_added: 0,
            hash_entries: Vec::new(),
        }
    }

    /// Probes per key.
    pub fn num_probes(&self) -> u32 {
        self.num_probes
    }

    pub(crate) fn build(self) -> Bytes {
        let len = self.calculate_space(self.hash_entries.len()) - METADATA_LEN;
        let mut data = vec![0u8; len];
        if len > 0 {
            for &h in &self.hash_entries {
                add_hash(h, &mut data, self.num_probes);
            }
        }
        data.extend_from_slice(&new_impl_trailer(SubImpl::FastLocalBloom, self.num_probes));
        Bytes::from(data)
    }
}

impl FilterBitsBuilder for FastLocalBloomBitsBuilder {
    fn add_key(&mut self, key: &[u8]) {
        let hash = bloom_hash64(key);
        self.num_added += 1;
        if self.hash_entries.last() != Some(&hash) {
            self.hash_entries.push(hash);
        }
    }

    fn num_added(&self) -> usize {
        self.num_added
    }

    fn calculate_space(&self, num_entries: usize) -> usize {
        let bits = num_entries as u64 * self.millibits_per_key as u64;
        let num_lines = bits.div_ceil(CACHE_LINE_SIZE as u64 * 8 * 1000);
        num_lines as usize * CACHE_LINE_SIZE + METADATA_LEN
    }

    fn estimated_fp_rate(&self, num_entries: usize, bytes: usize) -> f64 {
        estimated_fp_rate(num_entries, bytes.saturating_sub(METADATA_LEN), self.num_probes)
    }

    fn finish(self: Box<Self>) -> Bytes {
        (*self).build()
    }
}

/// Reads cache-local Bloom filters.
#[derive(Debug, Clone)]
pub struct FastLocalBloomBitsReader {
    data: Bytes,
    num_probes: u32,
}

impl FastLocalBloomBitsReader {
    /// Wraps `contents` whose trailer announced `num_probes`.
    pub fn new(contents: &Bytes, num_probes: u32) -> Result<Self> {
        let len = contents.len().saturating_sub(METADATA_LEN);
        if len == 0 || len % CACHE_LINE_SIZE != 0 {
            return Err(Error::corruption(format!(
                "cache-local bloom filter of {} bytes is not a whole number of lines",
                len
            )));
        }
        Ok(Self { data: contents.slice(..len), num_probes })
    }

    /// Probes per key.
    pub fn num_probes(&self) -> u32 {
        self.num_probes
    }
}

impl FilterBitsReader for FastLocalBloomBitsReader {
    fn may_match(&self, key: &[u8]) -> bool {
        hash_may_match(bloom_hash64(key), &self.data, self.num_probes)
    }
}

/// Expected false positive rate for `bytes` of bit array over `num_entries` keys.
pub fn estimated_fp_rate(num_entries: usize, bytes: usize, num_probes: u32) -> f64 {
    if num_entries == 0 {
        return 0.0;
    }
    let bits_per_key = 8.0 * bytes as f64 / num_entries as f64;
    let filter_rate =
        math::cache_local_fp_rate(bits_per_key, num_probes, (CACHE_LINE_SIZE * 8) as u32);
    let fingerprint_rate = math::fingerprint_fp_rate(num_entries, 64);
    math::independent_probability_sum(filter_rate, fingerprint_rate)
}

/// Maps `hash` uniformly onto `0..range` without division.
fn fast_range32(range: u32, hash: u32) -> u32 {
    ((hash as u64 * range as u64) >> 32) as u32
}

fn line_offset(h1: u32, len: usize) -> usize {
    (fast_range32((len / CACHE_LINE_SIZE) as u32, h1) as usize) * CACHE_LINE_SIZE
}

fn add_hash(h: u64, data: &mut [u8], num_probes: u32) {
    let offset = line_offset(h as u32, data.len());
    let line = &mut data[offset..offset + CACHE_LINE_SIZE];
    let mut h2 = (h >> 32) as u32;
    for _ in 0..num_probes {
        let bitpos = (h2 >> (32 - 9)) as usize;
        line[bitpos >> 3] |= 1 << (bitpos & 7);
        h2 = h2.wrapping_mul(PROBE_MULTIPLIER);
    }
}

fn hash_may_match(h: u64, data: &[u8], num_probes: u32) -> bool {
    let offset = line_offset(h as u32, data.len());
    let line = &data[offset..offset + CACHE_LINE_SIZE];
    let mut h2 = (h >> 32) as u32;
    for _ in 0..num_probes {
        let bitpos = (h2 >> (32 - 9)) as usize;
        if line[bitpos >> 3] & (1 << (bitpos & 7)) == 0 {
            return false;
        }
        h2 = h2.wrapping_mul(PROBE_MULTIPLIER);
    }
    true
}
