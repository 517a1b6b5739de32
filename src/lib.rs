//! # AiDb Filter - Versioned Filter Policies for Block-Based Tables
//!
//! This crate builds and reads the probabilistic membership filters stored
//! in AiDb table files. A filter answers "is this key definitely absent?"
//! so that a lookup can skip reading and searching a data block. Filters
//! never report false negatives; false positives occur at a rate tuned by
//! bits per key.
//!
//! ## Architecture
//!
//! - **FilterPolicy**: Hands out builders and readers; persisted by name
//! - **FilterBuildingContext**: Borrowed table options seen at build time
//! - **FilterBitsBuilder / FilterBitsReader**: The per-filter contract
//! - **Encodings**: Legacy Bloom, cache-local Bloom and the deprecated
//!   block-based Bloom filter
//!
//! Every filter written through a builder ends with a trailer naming its
//! encoding. Readers are chosen from that trailer, not from the policy's
//! current configuration, so filters written years ago stay readable after
//! the default encoding changes.
//!
//! ## Example Usage
//!
//! ```rust
//! use aidb_filter::filter::{FilterBuildingContext, new_bloom_filter_policy};
//! use aidb_filter::{FilterBitsBuilder, FilterBitsReader, TableOptions};
//!
//! # fn main() -> Result<(), aidb_filter::Error> {
//! let options = TableOptions::new()
//!     .format_version(5)
//!     .filter_policy(new_bloom_filter_policy(10.0, false));
//!
//! // Writer side: one builder per filter unit.
//! let mut builder = FilterBuildingContext::new(&options)
//!     .get_builder()
//!     .expect("policy builds filters");
//! builder.add_key(b"key1");
//! builder.add_key(b"key2");
//! let contents = builder.finish();
//!
//! // Reader side: only the bytes are needed to pick the right reader.
//! let policy = options.filter_policy.as_ref().unwrap();
//! let reader = policy.get_reader(&contents)?;
//! assert!(reader.may_match(b"key1"));
//! assert!(reader.may_match(b"key2"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod filter;

// Re-exports
pub use config::{FilterPolicyConfig, TableOptions};
pub use error::{Error, Result};
pub use filter::{
    new_bloom_filter_policy, BloomFilterPolicy, FilterBitsBuilder, FilterBitsReader,
    FilterBuildingContext, FilterImpl, FilterPolicy, Mode,
};
