//! Filter policy demo
//!
//! Builds filters for the same keys under different table format versions
//! and shows that one reader path decodes all of them.

use aidb_filter::filter::{BuiltinFilterBitsReader, FilterBuildingContext};
use aidb_filter::{
    BloomFilterPolicy, FilterBitsBuilder, FilterBitsReader, FilterPolicy, FilterPolicyConfig,
    TableOptions,
};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("=== AiDb Filter Policy Demo ===\n");

    let config: FilterPolicyConfig = "bloomfilter:10:false".parse()?;
    println!("Config: {}", config.to_json()?);
    let policy = Arc::new(config.build());

    let keys: Vec<String> = (0..10000).map(|i| format!("user:{:06}", i)).collect();

    for format_version in [4, 5] {
        let options = TableOptions::new()
            .format_version(format_version)
            .filter_policy(policy.clone());
        options.validate()?;

        let mut builder = FilterBuildingContext::new(&options)
            .get_builder()
            .ok_or_else(|| anyhow::anyhow!("policy declined to build a filter"))?;
        for key in &keys {
            builder.add_key(key.as_bytes());
        }
        let estimate = builder.estimated_fp_rate(keys.len(), builder.calculate_space(keys.len()));
        let contents = builder.finish();

        let reader = policy.new_reader(&contents)?;
        let encoding = match &reader {
            BuiltinFilterBitsReader::LegacyBloom(_) => "legacy bloom",
            BuiltinFilterBitsReader::FastLocalBloom(_) => "fast local bloom",
            _ => "trivial",
        };

        let false_positives = (0..100000)
            .filter(|i| reader.may_match(format!("absent:{:06}", i).as_bytes()))
            .count();

        println!("Format version {}:", format_version);
        println!("  Encoding:  {}", encoding);
        println!("  Size:      {} bytes for {} keys", contents.len(), keys.len());
        let fp_rate = false_positives as f64 / 100000.0;
        println!("  FP rate:   {:.4} (estimate {:.4})", fp_rate, estimate);
    }

    println!("\nDeprecated block-based filter:");
    let block_policy: BloomFilterPolicy =
        "bloomfilter:10:true".parse::<FilterPolicyConfig>()?.build();
    let refs: Vec<&[u8]> = keys.iter().take(100).map(|k| k.as_bytes()).collect();
    let mut filter = BytesMut::new();
    block_policy.create_filter(&refs, &mut filter);
    println!("  Size:      {} bytes for {} keys", filter.len(), refs.len());
    println!("  Contains user:000042: {}", block_policy.key_may_match(b"user:000042", &filter));

    println!("\nDamaged filter:");
    let damaged = Bytes::from_static(&[0u8, 0, 0, 0, 0, 0, 0xff, 9, 6, 0, 0]);
    match policy.get_reader(&damaged) {
        Ok(_) => println!("  unexpectedly decoded"),
        Err(e) => println!("  rejected: {}", e),
    }

    Ok(())
}
