//! Configuration for table filters.

use crate::error::{Error, Result};
use crate::filter::{BloomFilterPolicy, FilterImpl, FilterPolicy, Mode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Newest table format version this crate can write.
pub const LATEST_FORMAT_VERSION: u32 = 5;

/// Format version used when none is configured.
pub const DEFAULT_FORMAT_VERSION: u32 = 4;

/// Table options visible to filter policies at build time.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Highest format version that readers of new tables must support.
    /// Filters readable only by newer readers are never built.
    /// Default: 4
    pub format_version: u32,

    /// Policy used to build filters. `None` disables filters.
    /// Default: None
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,

    /// Add whole keys to filters, not just prefixes.
    /// Default: true
    pub whole_key_filtering: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            format_version: DEFAULT_FORMAT_VERSION,
            filter_policy: None,
            whole_key_filtering: true,
        }
    }
}

impl TableOptions {
    /// Creates a new TableOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table format version.
    pub fn format_version(mut self, version: u32) -> Self {
        self.format_version = version;
        self
    }

    /// Sets the filter policy.
    pub fn filter_policy(mut self, policy: Arc<dyn FilterPolicy>) -> Self {
        self.filter_policy = Some(policy);
        self
    }

    /// Sets whether whole keys are added to filters.
    pub fn whole_key_filtering(mut self, value: bool) -> Self {
        self.whole_key_filtering = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.format_version > LATEST_FORMAT_VERSION {
            return Err(Error::invalid_argument(format!(
                "format_version {} is newer than the latest supported version {}",
                self.format_version, LATEST_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

/// Serializable description of a [`BloomFilterPolicy`].
///
/// Accepts JSON (`{"bits_per_key": 10.0, "mode": "auto"}`) or the short
/// text form `bloomfilter:<bits_per_key>[:<use_block_based_builder>]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPolicyConfig {
    /// Bits per key. Values below 0.5 disable filtering.
    /// Default: 10.0
    pub bits_per_key: f64,

    /// Encoding selection mode.
    /// Default: Mode::Auto
    pub mode: Mode,
}

impl Default for FilterPolicyConfig {
    fn default() -> Self {
        Self { bits_per_key: 10.0, mode: Mode::Auto }
    }
}

impl FilterPolicyConfig {
    /// Parses a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.bits_per_key.is_finite() || self.bits_per_key < 0.0 {
            return Err(Error::invalid_argument(format!(
                "bits_per_key must be a non-negative number, got {}",
                self.bits_per_key
            )));
        }
        Ok(())
    }

    /// Creates the configured policy.
    pub fn build(&self) -> BloomFilterPolicy {
        BloomFilterPolicy::new(self.bits_per_key, self.mode)
    }
}

impl FromStr for FilterPolicyConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        match parts.next() {
            Some("bloomfilter") => {}
            _ => {
                return Err(Error::invalid_argument(format!("unknown filter policy: {:?}", s)));
            }
        }

        let bits_per_key = parts
            .next()
            .ok_or_else(|| Error::invalid_argument("missing bits_per_key"))?
            .parse::<f64>()
            .map_err(|e| Error::invalid_argument(format!("invalid bits_per_key: {}", e)))?;

        let mode = match parts.next() {
            None | Some("false") => Mode::Auto,
            Some("true") => Mode::Fixed(FilterImpl::DeprecatedBlock),
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "invalid use_block_based_builder: {:?}",
                    other
                )));
            }
        };

        if parts.next().is_some() {
            return Err(Error::invalid_argument(format!("trailing fields in {:?}", s)));
        }

        let config = Self { bits_per_key, mode };
        config.validate()?;
        Ok(config)
    }
}
