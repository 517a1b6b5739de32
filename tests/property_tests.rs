use aidb_filter::config::LATEST_FORMAT_VERSION;
use aidb_filter::filter::{BuiltinFilterBitsBuilder, FilterBuildingContext};
use aidb_filter::{
    BloomFilterPolicy, FilterBitsBuilder, FilterBitsReader, FilterImpl, FilterPolicy, Mode,
    TableOptions,
};
use bytes::BytesMut;
use proptest::prelude::*;

// Strategy: Generate arbitrary keys, duplicates and the empty key included
fn arb_keys() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..48), 0..300)
}

fn arb_builder_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![
        Just(Mode::Fixed(FilterImpl::LegacyBloom)),
        Just(Mode::Fixed(FilterImpl::FastLocalBloom)),
        Just(Mode::Auto),
    ]
}

fn new_builder(bits_per_key: f64, mode: Mode, format_version: u32) -> BuiltinFilterBitsBuilder {
    let options = TableOptions::new().format_version(format_version);
    BloomFilterPolicy::new(bits_per_key, mode)
        .new_builder(&FilterBuildingContext::new(&options))
        .unwrap()
}

proptest! {
    #[test]
    fn prop_no_false_negatives(
        keys in arb_keys(),
        bits_per_key in 1.0f64..30.0,
        mode in arb_builder_mode(),
        format_version in 0..=LATEST_FORMAT_VERSION,
    ) {
        let mut builder = Box::new(new_builder(bits_per_key, mode, format_version));
        for key in &keys {
            builder.add_key(key);
        }
        let contents = builder.finish();

        // Any policy can read it back, whatever its own configuration.
        let reader = BloomFilterPolicy::new(10.0, Mode::Fixed(FilterImpl::DeprecatedBlock))
            .get_reader(&contents)
            .unwrap();
        for key in &keys {
            prop_assert!(reader.may_match(key), "false negative for {:?}", key);
        }
    }

    #[test]
    fn prop_space_estimate_is_sound(
        keys in arb_keys(),
        bits_per_key in 1.0f64..30.0,
        mode in arb_builder_mode(),
    ) {
        let mut builder = Box::new(new_builder(bits_per_key, mode, LATEST_FORMAT_VERSION));
        let estimate = builder.calculate_space(keys.len());
        for key in &keys {
            builder.add_key(key);
        }
        prop_assert_eq!(builder.num_added(), keys.len());
        let contents = builder.finish();
        prop_assert!(contents.len() <= estimate, "{} > {}", contents.len(), estimate);
    }

    #[test]
    fn prop_calculate_space_monotonic(
        n in 0usize..100_000,
        bits_per_key in 1.0f64..100.0,
        mode in arb_builder_mode(),
    ) {
        let builder = new_builder(bits_per_key, mode, LATEST_FORMAT_VERSION);
        prop_assert!(builder.calculate_space(n) <= builder.calculate_space(n + 1));
    }

    #[test]
    fn prop_calculate_num_entry_inverts_space(
        space in 0usize..200_000,
        bits_per_key in 1.0f64..30.0,
        mode in arb_builder_mode(),
    ) {
        let builder = new_builder(bits_per_key, mode, LATEST_FORMAT_VERSION);
        let n = builder.calculate_num_entry(space);
        if n > 0 {
            prop_assert!(builder.calculate_space(n) <= space);
        }
        prop_assert!(builder.calculate_space(n + 1) > space);
    }

    #[test]
    fn prop_auto_mode_readable_at_higher_versions(
        v1 in 0..=LATEST_FORMAT_VERSION,
        delta in 0u32..3,
    ) {
        let v2 = (v1 + delta).min(LATEST_FORMAT_VERSION);
        prop_assert!(Mode::Auto.select(v1).readable_at(v2));
    }

    #[test]
    fn prop_block_filter_no_false_negatives(keys in arb_keys(), bits_per_key in 1.0f64..30.0) {
        let policy = BloomFilterPolicy::new(bits_per_key, Mode::Fixed(FilterImpl::DeprecatedBlock));
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let mut filter = BytesMut::new();
        policy.create_filter(&refs, &mut filter);
        for key in &keys {
            prop_assert!(policy.key_may_match(key, &filter));
        }
    }
}
