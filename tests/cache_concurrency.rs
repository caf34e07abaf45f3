// ==============================================
// CACHE CONCURRENCY TESTS (integration)
// ==============================================
//
// Multi-threaded interleavings of the public surface. The cache handle is
// Clone and internally synchronized, so threads share it directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use memkit::cache::MemoryCache;

#[test]
fn interleaved_ops_preserve_invariants() {
    let cache: MemoryCache<String, String> = MemoryCache::builder()
        .count_limit(100)
        .auto_trim_interval(Duration::from_millis(100))
        .build();
    let num_threads = 8;
    let operations_per_thread = 250;
    let completed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let cache = cache.clone();
            let completed = Arc::clone(&completed);

            thread::spawn(move || {
                for i in 0..operations_per_thread {
                    match i % 4 {
                        0 => {
                            let key = format!("thread_{}_{}", thread_id, i);
                            let value = format!("value_{}_{}", thread_id, i);
                            cache.put(key, value);
                        }
                        1 => {
                            let key = format!("thread_{}_0", thread_id);
                            let _ = cache.get(&key);
                        }
                        2 => {
                            let key = format!("thread_{}_{}", thread_id, i / 2);
                            let _ = cache.contains(&key);
                        }
                        _ => {
                            if i % 20 == 0 {
                                let key = format!("thread_{}_{}", thread_id, i / 4);
                                cache.remove(&key);
                            }
                        }
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        completed.load(Ordering::SeqCst),
        num_threads * operations_per_thread
    );
    cache.check_invariants().unwrap();
    assert!(
        cache.total_count() <= 100,
        "count {} exceeded the soft limit after quiescence",
        cache.total_count()
    );
}

#[test]
fn concurrent_puts_against_count_limit() {
    let cache: MemoryCache<u64, u64> = MemoryCache::builder()
        .count_limit(64)
        .auto_trim_interval(Duration::from_millis(100))
        .build();

    let handles: Vec<_> = (0..4u64)
        .map(|thread_id| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..500u64 {
                    cache.put(thread_id * 1_000 + i, i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    cache.check_invariants().unwrap();
    assert!(cache.total_count() <= 64);
}

#[test]
fn aggregates_stay_mutually_consistent() {
    // Every entry carries cost 2, so the cost sum must always be exactly
    // twice the entry count once the writers finish.
    let cache: MemoryCache<u64, u64> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    let handles: Vec<_> = (0..4u64)
        .map(|thread_id| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..200u64 {
                    let key = thread_id * 1_000 + i;
                    cache.put_with_cost(key, i, 2);
                    if i % 3 == 0 {
                        cache.remove(&key);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    cache.check_invariants().unwrap();
    assert_eq!(cache.total_cost(), 2 * cache.total_count() as u64);
}

#[test]
fn foreground_reads_stay_responsive_during_trim() {
    let cache: MemoryCache<u64, Vec<u8>> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    for i in 0..5_000u64 {
        cache.put_with_cost(i, vec![0u8; 16], 1);
    }
    cache.put(u64::MAX, vec![1u8; 16]);

    let trimmer = {
        let cache = cache.clone();
        thread::spawn(move || cache.trim_to_count(10))
    };

    // The cooperative trim yields the lock between evictions, so reads in
    // flight never wait behind the whole pass.
    let mut max_latency = Duration::ZERO;
    for _ in 0..200 {
        let start = Instant::now();
        let _ = cache.get(&u64::MAX);
        max_latency = max_latency.max(start.elapsed());
        thread::sleep(Duration::from_micros(200));
    }
    trimmer.join().unwrap();

    assert!(
        max_latency < Duration::from_secs(1),
        "read stalled {:?} behind a trim pass",
        max_latency
    );
    assert!(cache.total_count() <= 10);
    cache.check_invariants().unwrap();
}

#[test]
fn remove_all_races_with_writers() {
    let cache: MemoryCache<u64, u64> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_millis(100))
        .build();

    let writers: Vec<_> = (0..3u64)
        .map(|thread_id| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..300u64 {
                    cache.put(thread_id * 10_000 + i, i);
                }
            })
        })
        .collect();

    for _ in 0..20 {
        cache.remove_all();
        thread::sleep(Duration::from_millis(1));
    }
    for handle in writers {
        handle.join().unwrap();
    }

    cache.check_invariants().unwrap();
    cache.remove_all();
    assert_eq!(cache.total_count(), 0);
    assert_eq!(cache.total_cost(), 0);
}
