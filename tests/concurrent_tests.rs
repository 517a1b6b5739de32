// Concurrent Access Tests for filter readers
// These tests verify that one finished filter can serve many threads

use aidb_filter::filter::{BuiltinFilterBitsReader, FilterBuildingContext};
use aidb_filter::{
    BloomFilterPolicy, FilterBitsBuilder, FilterBitsReader, FilterPolicy, Mode, TableOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_readers_and_policies_are_shareable() {
    assert_send_sync::<BloomFilterPolicy>();
    assert_send_sync::<BuiltinFilterBitsReader>();
    assert_send_sync::<Box<dyn FilterBitsReader>>();
    assert_send_sync::<Arc<dyn FilterPolicy>>();
}

/// Test concurrent queries against one reader from multiple threads
#[test]
fn test_concurrent_reads() {
    let policy = Arc::new(BloomFilterPolicy::new(10.0, Mode::Auto));
    let options = TableOptions::new().format_version(5);
    let mut builder = policy.get_builder(&FilterBuildingContext::new(&options)).unwrap();
    for i in 0..1000 {
        builder.add_key(format!("read_key_{}", i).as_bytes());
    }
    let contents = builder.finish();
    let reader: Arc<dyn FilterBitsReader> = Arc::from(policy.get_reader(&contents).unwrap());

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let false_positives = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..num_threads {
        let reader = Arc::clone(&reader);
        let barrier = Arc::clone(&barrier);
        let false_positives = Arc::clone(&false_positives);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..1000 {
                let key = format!("read_key_{}", i);
                assert!(reader.may_match(key.as_bytes()), "thread {} missed {}", thread_id, key);
            }
            for i in 0..1000 {
                let key = format!("absent_{}_{}", thread_id, i);
                if reader.may_match(key.as_bytes()) {
                    false_positives.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let fps = false_positives.load(Ordering::Relaxed);
    assert!(fps < 400, "Too many false positives: {}/8000", fps);
}

/// Test one builder per thread sharing a single policy
#[test]
fn test_concurrent_builders_share_policy() {
    let policy: Arc<dyn FilterPolicy> = Arc::new(BloomFilterPolicy::new(10.0, Mode::Auto));
    let mut handles = vec![];

    for thread_id in 0..4 {
        let policy = Arc::clone(&policy);
        handles.push(thread::spawn(move || {
            let options = TableOptions::new().format_version(4 + thread_id % 2);
            let mut builder = policy.get_builder(&FilterBuildingContext::new(&options)).unwrap();
            for i in 0..500 {
                builder.add_key(format!("t{}_k{}", thread_id, i).as_bytes());
            }
            (thread_id, builder.finish())
        }));
    }

    for handle in handles {
        let (thread_id, contents) = handle.join().unwrap();
        let reader = policy.get_reader(&contents).unwrap();
        for i in 0..500 {
            assert!(reader.may_match(format!("t{}_k{}", thread_id, i).as_bytes()));
        }
    }
}
