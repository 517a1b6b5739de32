//! The builtin Bloom filter policy.
//!
//! [`BloomFilterPolicy`] picks an encoding for new filters from its [`Mode`]
//! and the table format version, and reads filters of every builtin
//! encoding by inspecting their trailer.

use crate::error::Result;
use crate::filter::format::FilterMetadata;
use crate::filter::{
    block_bloom, legacy_bloom, FastLocalBloomBitsBuilder, FastLocalBloomBitsReader,
    FilterBitsBuilder, FilterBitsReader, FilterBuildingContext, FilterPolicy,
    LegacyBloomBitsBuilder, LegacyBloomBitsReader,
};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The concrete filter encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterImpl {
    /// Legacy cache-local Bloom filter over a 32-bit hash. Full and
    /// partitioned filters written before format version 5.
    LegacyBloom,
    /// Deprecated per-block filter built with
    /// [`FilterPolicy::create_filter`].
    DeprecatedBlock,
    /// Cache-local Bloom filter over a 64-bit hash.
    FastLocalBloom,
}

impl FilterImpl {
    /// Oldest table format version whose readers understand this encoding.
    pub fn min_format_version(self) -> u32 {
        match self {
            FilterImpl::LegacyBloom | FilterImpl::DeprecatedBlock => 0,
            FilterImpl::FastLocalBloom => 5,
        }
    }

    /// Whether readers built for `format_version` can decode this encoding.
    pub fn readable_at(self, format_version: u32) -> bool {
        format_version >= self.min_format_version()
    }

    /// Newest builder-path encoding readable at `format_version`.
    pub fn best_for_format_version(format_version: u32) -> Self {
        if FilterImpl::FastLocalBloom.readable_at(format_version) {
            FilterImpl::FastLocalBloom
        } else {
            FilterImpl::LegacyBloom
        }
    }
}

/// How a [`BloomFilterPolicy`] selects the encoding for new filters.
///
/// Only matters when building; readers identify the encoding from the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Always use one encoding, ignoring the format version. Pinning
    /// [`FilterImpl::LegacyBloom`] or [`FilterImpl::FastLocalBloom`] is
    /// meant for tests; [`FilterImpl::DeprecatedBlock`] is user exposed.
    Fixed(FilterImpl),
    /// Use the best encoding the format version allows. Never selects
    /// [`FilterImpl::DeprecatedBlock`].
    #[default]
    Auto,
}

impl Mode {
    /// Every mode that pins a single encoding.
    pub const ALL_FIXED_IMPLS: [Mode; 3] = [
        Mode::Fixed(FilterImpl::LegacyBloom),
        Mode::Fixed(FilterImpl::DeprecatedBlock),
        Mode::Fixed(FilterImpl::FastLocalBloom),
    ];

    /// Every mode reachable through [`new_bloom_filter_policy`].
    pub const ALL_USER_MODES: [Mode; 2] = [Mode::Fixed(FilterImpl::DeprecatedBlock), Mode::Auto];

    /// Encoding this mode builds at `format_version`.
    pub fn select(self, format_version: u32) -> FilterImpl {
        match self {
            Mode::Fixed(filter_impl) => filter_impl,
            Mode::Auto => FilterImpl::best_for_format_version(format_version),
        }
    }
}

/// A builder for one of the builder-path encodings.
#[derive(Debug, Clone)]
pub enum BuiltinFilterBitsBuilder {
    /// See [`LegacyBloomBitsBuilder`].
    LegacyBloom(LegacyBloomBitsBuilder),
    /// See [`FastLocalBloomBitsBuilder`].
    FastLocalBloom(FastLocalBloomBitsBuilder),
}

impl BuiltinFilterBitsBuilder {
    /// Encoding this builder writes.
    pub fn filter_impl(&self) -> FilterImpl {
        match self {
            BuiltinFilterBitsBuilder::LegacyBloom(_) => FilterImpl::LegacyBloom,
            BuiltinFilterBitsBuilder::FastLocalBloom(_) => FilterImpl::FastLocalBloom,
        }
    }

    fn inner(&self) -> &dyn FilterBitsBuilder {
        match self {
            BuiltinFilterBitsBuilder::LegacyBloom(b) => b,
            BuiltinFilterBitsBuilder::FastLocalBloom(b) => b,
        }
    }
}

impl FilterBitsBuilder for BuiltinFilterBitsBuilder {
    fn add_key(&mut self, key: &[u8]) {
        match self {
            BuiltinFilterBitsBuilder::LegacyBloom(b) => b.add_key(key),
            BuiltinFilterBitsBuilder::FastLocalBloom(b) => b.add_key(key),
        }
    }

    fn num_added(&self) -> usize {
        self.inner().num_added()
    }

    fn calculate_space(&self, num_entries: usize) -> usize {
        self.inner().calculate_space(num_entries)
    }

    fn estimated_fp_rate(&self, num_entries: usize, bytes: usize) -> f64 {
        self.inner().estimated_fp_rate(num_entries, bytes)
    }

    fn finish(self: Box<Self>) -> Bytes {
        match *self {
            BuiltinFilterBitsBuilder::LegacyBloom(b) => b.build(),
            BuiltinFilterBitsBuilder::FastLocalBloom(b) => b.build(),
        }
    }
}

/// A reader for any builder-path encoding.
#[derive(Debug, Clone)]
pub enum BuiltinFilterBitsReader {
    /// Filter over zero keys: nothing matches.
    AlwaysFalse,
    /// Filter that could not be trusted: everything matches.
    AlwaysTrue,
    /// See [`LegacyBloomBitsReader`].
    LegacyBloom(LegacyBloomBitsReader),
    /// See [`FastLocalBloomBitsReader`].
    FastLocalBloom(FastLocalBloomBitsReader),
}

impl FilterBitsReader for BuiltinFilterBitsReader {
    fn may_match(&self, key: &[u8]) -> bool {
        match self {
            BuiltinFilterBitsReader::AlwaysFalse => false,
            BuiltinFilterBitsReader::AlwaysTrue => true,
            BuiltinFilterBitsReader::LegacyBloom(r) => r.may_match(key),
            BuiltinFilterBitsReader::FastLocalBloom(r) => r.may_match(key),
        }
    }
}

/// The builtin Bloom filter policy.
///
/// Configuration is fixed at construction; the policy holds no other state
/// and can be shared freely.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilterPolicy {
    millibits_per_key: u32,
    whole_bits_per_key: u32,
    legacy_num_probes: u32,
    mode: Mode,
}

impl BloomFilterPolicy {
    /// Name persisted in table metadata.
    pub const NAME: &'static str = "aidb.BuiltinBloomFilter";

    /// Creates a policy spending about `bits_per_key` bits per key.
    ///
    /// Values below 0.5 (and NaN) disable filtering: the policy then hands
    /// out no builders. Other values are clamped to `[1, 100]`.
    pub fn new(bits_per_key: f64, mode: Mode) -> Self {
        let bits_per_key = if !(bits_per_key >= 0.5) {
            log::debug!("bits_per_key {} disables filter building", bits_per_key);
            0.0
        } else if bits_per_key < 1.0 {
            log::warn!("bits_per_key {} too small, using 1", bits_per_key);
            1.0
        } else if bits_per_key > 100.0 {
            log::warn!("bits_per_key {} too large, using 100", bits_per_key);
            100.0
        } else {
            bits_per_key
        };

        let millibits_per_key = (bits_per_key * 1000.0).round() as u32;
        let whole_bits_per_key = (millibits_per_key + 500) / 1000;
        Self {
            millibits_per_key,
            whole_bits_per_key,
            legacy_num_probes: legacy_bloom::choose_num_probes(whole_bits_per_key),
            mode,
        }
    }

    /// Configured bits per key after sanitising.
    pub fn bits_per_key(&self) -> f64 {
        self.millibits_per_key as f64 / 1000.0
    }

    /// Selection mode for new filters.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns a builder for one filter unit.
    ///
    /// `None` means "build no filter": either filtering is disabled or the
    /// mode pins [`FilterImpl::DeprecatedBlock`], which only supports
    /// [`FilterPolicy::create_filter`].
    pub fn new_builder(
        &self,
        context: &FilterBuildingContext<'_>,
    ) -> Option<BuiltinFilterBitsBuilder> {
        if self.millibits_per_key == 0 {
            return None;
        }

        let format_version = context.format_version();
        let selected = self.mode.select(format_version);
        log::debug!(
            "Selected {:?} filter for mode {:?} at format version {}",
            selected,
            self.mode,
            format_version
        );

        match selected {
            FilterImpl::LegacyBloom => Some(BuiltinFilterBitsBuilder::LegacyBloom(
                LegacyBloomBitsBuilder::new(self.whole_bits_per_key),
            )),
            FilterImpl::FastLocalBloom => Some(BuiltinFilterBitsBuilder::FastLocalBloom(
                FastLocalBloomBitsBuilder::new(self.millibits_per_key),
            )),
            FilterImpl::DeprecatedBlock => None,
        }
    }

    /// Returns a reader for `contents`, chosen by the trailer alone.
    ///
    /// Fails if the trailer names an encoding this version does not know or
    /// the layout is inconsistent.
    pub fn new_reader(&self, contents: &Bytes) -> Result<BuiltinFilterBitsReader> {
        match FilterMetadata::parse(contents)? {
            FilterMetadata::Empty => Ok(BuiltinFilterBitsReader::AlwaysFalse),
            FilterMetadata::LegacyBloom { num_probes, num_lines } => {
                LegacyBloomBitsReader::new(contents, num_probes, num_lines)
                    .map(BuiltinFilterBitsReader::LegacyBloom)
            }
            FilterMetadata::FastLocalBloom { num_probes } => {
                FastLocalBloomBitsReader::new(contents, num_probes)
                    .map(BuiltinFilterBitsReader::FastLocalBloom)
            }
        }
    }

    /// Like [`new_reader`](Self::new_reader), but a filter that cannot be
    /// decoded matches every key so the caller falls back to reading the
    /// block.
    pub fn reader_or_pass_through(&self, contents: &Bytes) -> BuiltinFilterBitsReader {
        match self.new_reader(contents) {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("Ignoring undecodable filter of {} bytes: {}", contents.len(), e);
                BuiltinFilterBitsReader::AlwaysTrue
            }
        }
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut BytesMut) {
        debug_assert_eq!(self.mode, Mode::Fixed(FilterImpl::DeprecatedBlock));
        debug_assert!(self.millibits_per_key > 0, "filtering is disabled for this policy");
        block_bloom::create_filter(keys, self.whole_bits_per_key, self.legacy_num_probes, dst);
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        block_bloom::key_may_match(key, filter)
    }

    fn get_builder(
        &self,
        context: &FilterBuildingContext<'_>,
    ) -> Option<Box<dyn FilterBitsBuilder>> {
        self.new_builder(context).map(|b| Box::new(b) as Box<dyn FilterBitsBuilder>)
    }

    fn get_reader(&self, contents: &Bytes) -> Result<Box<dyn FilterBitsReader>> {
        self.new_reader(contents).map(|r| Box::new(r) as Box<dyn FilterBitsReader>)
    }
}

/// Creates the builtin Bloom filter policy.
///
/// A `bits_per_key` of 10 gives roughly a 1% false positive rate. With
/// `use_block_based_builder` the policy builds the deprecated per-block
/// filter; otherwise the encoding follows the table format version.
pub fn new_bloom_filter_policy(
    bits_per_key: f64,
    use_block_based_builder: bool,
) -> Arc<dyn FilterPolicy> {
    let mode = if use_block_based_builder {
        Mode::Fixed(FilterImpl::DeprecatedBlock)
    } else {
        Mode::Auto
    };
    Arc::new(BloomFilterPolicy::new(bits_per_key, mode))
}
