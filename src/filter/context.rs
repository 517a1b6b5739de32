//! Information available to a filter policy when a builder is requested.

use crate::config::TableOptions;
use crate::filter::FilterBitsBuilder;

/// Read-only view of the table configuration at filter-build time.
///
/// The context borrows the options, so policies cannot keep it past the
/// call that creates a builder.
#[derive(Debug, Clone, Copy)]
pub struct FilterBuildingContext<'a> {
    table_options: &'a TableOptions,
}

impl<'a> FilterBuildingContext<'a> {
    /// Wraps the options of the table being written.
    pub fn new(table_options: &'a TableOptions) -> Self {
        Self { table_options }
    }

    /// Options of the table being written.
    pub fn table_options(&self) -> &'a TableOptions {
        self.table_options
    }

    /// Highest table format version readers of this table will support.
    pub fn format_version(&self) -> u32 {
        self.table_options.format_version
    }

    /// Whether the table writer adds whole keys to the filter.
    pub fn whole_key_filtering(&self) -> bool {
        self.table_options.whole_key_filtering
    }

    /// Asks the configured policy for a builder.
    ///
    /// Returns `None` when the table has no filter policy or the policy
    /// declines to build a filter.
    pub fn get_builder(&self) -> Option<Box<dyn FilterBitsBuilder>> {
        self.table_options.filter_policy.as_ref()?.get_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::new_bloom_filter_policy;

    #[test]
    fn test_context_exposes_format_version() {
        let options = TableOptions::new().format_version(3);
        let context = FilterBuildingContext::new(&options);
        assert_eq!(context.format_version(), 3);
        assert!(context.whole_key_filtering());
        assert!(context.table_options().filter_policy.is_none());
    }

    #[test]
    fn test_no_policy_means_no_builder() {
        let options = TableOptions::new();
        assert!(FilterBuildingContext::new(&options).get_builder().is_none());
    }

    #[test]
    fn test_builder_from_configured_policy() {
        let options = TableOptions::new().filter_policy(new_bloom_filter_policy(10.0, false));
        let mut builder = FilterBuildingContext::new(&options).get_builder().unwrap();
        builder.add_key(b"key1");
        assert_eq!(builder.num_added(), 1);
        assert!(builder.finish().len() > 5);
    }
}
