//! Persisted filter trailer and encoding discovery.
//!
//! Every filter produced through the builder path ends with a
//! [`METADATA_LEN`]-byte trailer. The first trailer byte is the primary
//! marker:
//!
//! ```text
//! legacy:     [bits][num_probes: 1..=127][num_lines: u32 LE]
//! new impls:  [bits][0xFF][sub_impl][block_and_probes][0x00][0x00]
//! ```
//!
//! Marker values, once shipped, are never reassigned to a different layout.

use crate::error::{Error, Result};
use bytes::Buf;

/// Length of the trailer shared by all builder-path encodings.
pub const METADATA_LEN: usize = 5;

/// Primary marker announcing one of the newer encodings (`-1` as `i8`).
pub const NEW_IMPL_MARKER: u8 = 0xff;

/// Cache line size assumed when building cache-local filters.
pub const CACHE_LINE_SIZE: usize = 64;

/// Largest probe count any builder writes.
pub const MAX_NUM_PROBES: u32 = 30;

const LOG2_CACHE_LINE_SIZE: u32 = CACHE_LINE_SIZE.trailing_zeros();

/// Sub-implementations under [`NEW_IMPL_MARKER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubImpl {
    /// The cache-local Bloom filter with 64-bit hashing.
    FastLocalBloom = 0,
}

impl SubImpl {
    /// Convert from the persisted byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SubImpl::FastLocalBloom),
            _ => None,
        }
    }
}

/// Encoding identified from a filter's trailer, before any reader exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMetadata {
    /// Too short to hold a trailer; the filter covers zero keys.
    Empty,
    /// Legacy cache-local Bloom filter.
    LegacyBloom {
        /// Probes per key.
        num_probes: u32,
        /// Number of cache lines in the bit array.
        num_lines: u32,
    },
    /// Cache-local Bloom filter with 64-bit hashing.
    FastLocalBloom {
        /// Probes per key.
        num_probes: u32,
    },
}

impl FilterMetadata {
    /// Reads the trailer of `contents` and identifies its encoding.
    ///
    /// Unknown or reserved markers are reported as
    /// [`Error::UnsupportedFilter`], never guessed at.
    pub fn parse(contents: &[u8]) -> Result<Self> {
        let len_with_meta = contents.len();
        if len_with_meta <= METADATA_LEN {
            return Ok(FilterMetadata::Empty);
        }

        let mut trailer = &contents[len_with_meta - METADATA_LEN..];
        let marker = trailer.get_u8();
        match marker as i8 {
            -1 => Self::parse_new_impl(trailer),
            probes if probes >= 1 => Ok(FilterMetadata::LegacyBloom {
                num_probes: probes as u32,
                num_lines: trailer.get_u32_le(),
            }),
            _ => Err(Error::unsupported_filter(marker, "reserved legacy probe count")),
        }
    }

    fn parse_new_impl(mut trailer: &[u8]) -> Result<Self> {
        let sub_impl = trailer.get_u8();
        let block_and_probes = trailer.get_u8();
        let log2_block_bytes = ((block_and_probes >> 5) & 7) as u32 + 6;
        let num_probes = (block_and_probes & 31) as u32;
        let reserved = trailer.get_u16_le();

        if num_probes < 1 || num_probes > MAX_NUM_PROBES {
            return Err(Error::unsupported_filter(
                NEW_IMPL_MARKER,
                format!("reserved probe count {}", num_probes),
            ));
        }
        if reserved != 0 {
            return Err(Error::unsupported_filter(
                NEW_IMPL_MARKER,
                format!("reserved trailer bytes set: {:#06x}", reserved),
            ));
        }

        match SubImpl::from_u8(sub_impl) {
            Some(SubImpl::FastLocalBloom) if log2_block_bytes == LOG2_CACHE_LINE_SIZE => {
                Ok(FilterMetadata::FastLocalBloom { num_probes })
            }
            Some(SubImpl::FastLocalBloom) => Err(Error::unsupported_filter(
                NEW_IMPL_MARKER,
                format!("unsupported block size {} bytes", 1u32 << log2_block_bytes),
            )),
            None => Err(Error::unsupported_filter(
                NEW_IMPL_MARKER,
                format!("unknown sub-implementation {}", sub_impl),
            )),
        }
    }
}

/// Packs the new-implementation trailer for `sub_impl`.
pub(crate) fn new_impl_trailer(sub_impl: SubImpl, num_probes: u32) -> [u8; METADATA_LEN] {
    debug_assert!((1..=MAX_NUM_PROBES).contains(&num_probes));
    let block_and_probes = (((LOG2_CACHE_LINE_SIZE - 6) << 5) | num_probes) as u8;
    [NEW_IMPL_MARKER, sub_impl as u8, block_and_probes, 0, 0]
}
