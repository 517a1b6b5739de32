//! Filter policies and the builder/reader contract for table filters.
//!
//! A table writer asks a [`FilterPolicy`] for a [`FilterBitsBuilder`] once per
//! filter unit, adds that unit's keys and persists the finished bytes. A
//! table reader later hands those bytes back to [`FilterPolicy::get_reader`],
//! which identifies the encoding from the bytes themselves and returns a
//! [`FilterBitsReader`].
//!
//! The deprecated block-based filter uses the single-call
//! [`FilterPolicy::create_filter`] / [`FilterPolicy::key_may_match`] pair
//! instead. Its bytes are not accepted by the builder/reader path.

pub mod block_bloom;
pub mod context;
pub mod fast_local_bloom;
pub mod format;
mod hash;
pub mod legacy_bloom;
pub mod math;
pub mod policy;

pub use context::FilterBuildingContext;
pub use fast_local_bloom::{FastLocalBloomBitsBuilder, FastLocalBloomBitsReader};
pub use format::FilterMetadata;
pub use legacy_bloom::{LegacyBloomBitsBuilder, LegacyBloomBitsReader};
pub use policy::{
    new_bloom_filter_policy, BloomFilterPolicy, BuiltinFilterBitsBuilder,
    BuiltinFilterBitsReader, FilterImpl, Mode,
};

use crate::error::Result;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Accumulates the keys of one filter unit and serializes a filter.
///
/// A builder is owned by a single writer; it is not shared between threads
/// while keys are being added. [`finish`](FilterBitsBuilder::finish)
/// consumes it, so a finished builder cannot be reused.
pub trait FilterBitsBuilder: Send {
    /// Adds a key to the filter. Keys may arrive in any order and may repeat.
    fn add_key(&mut self, key: &[u8]);

    /// Number of keys added so far, including duplicates.
    fn num_added(&self) -> usize;

    /// Serialized size, trailer included, of a filter over `num_entries`
    /// keys. Non-decreasing in `num_entries`.
    fn calculate_space(&self, num_entries: usize) -> usize;

    /// Largest number of keys whose filter fits in `space` bytes.
    fn calculate_num_entry(&self, space: usize) -> usize {
        if self.calculate_space(0) > space {
            return 0;
        }
        // Every encoding spends at least one bit per key.
        let (mut low, mut high) = (0usize, space.saturating_mul(8));
        while low < high {
            let mid = low + (high - low + 1) / 2;
            if self.calculate_space(mid) <= space {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        low
    }

    /// Expected false positive rate of a `bytes`-long filter over
    /// `num_entries` keys built by this builder.
    fn estimated_fp_rate(&self, num_entries: usize, bytes: usize) -> f64;

    /// Serializes the filter. Every key passed to
    /// [`add_key`](FilterBitsBuilder::add_key) will match.
    fn finish(self: Box<Self>) -> Bytes;
}

/// Answers membership queries over finished filter bytes.
///
/// Readers never mutate the filter, so one reader may serve any number of
/// threads at once.
pub trait FilterBitsReader: Send + Sync {
    /// Returns false only if `key` was definitely never added.
    fn may_match(&self, key: &[u8]) -> bool;

    /// Queries several keys at once, writing one answer per key.
    fn may_match_batch(&self, keys: &[&[u8]], results: &mut [bool]) {
        debug_assert_eq!(keys.len(), results.len());
        for (key, result) in keys.iter().zip(results.iter_mut()) {
            *result = self.may_match(key);
        }
    }
}

/// Creates builders and readers for table filters.
///
/// Implementations are immutable after construction and shared across
/// table writers and readers.
pub trait FilterPolicy: Send + Sync + fmt::Debug {
    /// Name persisted in table metadata. Informational only; readers
    /// identify the encoding from the filter bytes.
    fn name(&self) -> &str;

    /// Appends a block-based filter over `keys` to `dst`.
    fn create_filter(&self, keys: &[&[u8]], dst: &mut BytesMut);

    /// Queries a filter produced by
    /// [`create_filter`](FilterPolicy::create_filter).
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;

    /// Returns a builder for one filter unit, or `None` when no filter
    /// should be built for it.
    ///
    /// The context is only borrowed for the duration of this call.
    fn get_builder(
        &self,
        context: &FilterBuildingContext<'_>,
    ) -> Option<Box<dyn FilterBitsBuilder>>;

    /// Returns a reader for bytes produced by any builtin builder,
    /// regardless of the mode this policy was configured with.
    fn get_reader(&self, contents: &Bytes) -> Result<Box<dyn FilterBitsReader>>;
}
