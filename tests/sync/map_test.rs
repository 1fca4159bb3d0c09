/*!
 * Concurrent map tests
 */

use ai_os_sync::{ConcurrentMap, MapStrategy, SyncConfig};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const STRATEGIES: [MapStrategy; 2] = [MapStrategy::Striped, MapStrategy::Sharded];

/// Value whose fields must always agree; a torn write would break that
#[derive(Clone, Debug)]
struct Pair {
    a: u64,
    b: u64,
}

#[test]
fn test_put_then_get_same_thread() {
    for strategy in STRATEGIES {
        let map = ConcurrentMap::with_strategy(strategy, 16);
        map.put("A", 10);
        assert_eq!(map.get(&"A"), Some(10));
        assert_eq!(map.get_or_default(&"B", 0), 0);
        assert_eq!(map.get(&"B"), None);
    }
}

#[test]
fn test_no_torn_reads() {
    for strategy in STRATEGIES {
        let map = Arc::new(ConcurrentMap::with_strategy(strategy, 4));
        map.put(0u32, Pair { a: 0, b: 0 });
        let stop = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4u64)
            .map(|w| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..2000 {
                        let v = w * 1_000_000 + i;
                        map.put(0, Pair { a: v, b: v });
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let map = Arc::clone(&map);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while !stop.load(Ordering::Relaxed) {
                        let snapshot = map.snapshot(&0).unwrap();
                        assert_eq!(snapshot.a, snapshot.b, "torn read");
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    }
}

#[test]
fn test_disjoint_keys_all_land() {
    for strategy in STRATEGIES {
        let map = Arc::new(ConcurrentMap::with_strategy(strategy, 32));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..500 {
                        map.put(t * 10_000 + i, i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 4000);

        let mut sum = 0u64;
        map.for_each(|_, v| sum += *v as u64);
        assert_eq!(sum, 8 * (0..500u64).sum::<u64>());

        map.clear();
        assert!(map.is_empty());
    }
}

#[test]
fn test_config_selects_backend() {
    let map: ConcurrentMap<u8, u8> = ConcurrentMap::with_config(&SyncConfig::high_contention());
    assert_eq!(map.strategy(), MapStrategy::Sharded);

    let map: ConcurrentMap<u8, u8> = ConcurrentMap::with_config(&SyncConfig::default());
    assert_eq!(map.strategy(), MapStrategy::Striped);
}

#[test]
#[should_panic(expected = "power of 2")]
fn test_invalid_stripe_count_panics() {
    let _map: ConcurrentMap<u8, u8> = ConcurrentMap::with_strategy(MapStrategy::Striped, 6);
}
