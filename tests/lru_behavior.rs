// ==============================================
// LRU BEHAVIOR TESTS (integration)
// ==============================================
//
// End-to-end scenarios exercising the public cache surface: deterministic
// LRU order, soft-bound enforcement through the background sweeper, cost
// accounting, purge signals, and release routing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use memkit::cache::MemoryCache;

/// Polls `cond` every 10 ms until it holds or `timeout` elapses.
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// Value type that counts its drops, for observing the release path.
struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ==============================================
// End-to-End Scenarios
// ==============================================

#[test]
fn basic_lru_eviction() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .count_limit(2)
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);

    assert!(cache.get(&"a").is_none());
    assert_eq!(cache.get(&"b").map(|v| *v), Some(2));
    assert_eq!(cache.get(&"c").map(|v| *v), Some(3));
    cache.check_invariants().unwrap();
}

#[test]
fn access_refreshes_recency() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .count_limit(2)
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("a", 1);
    cache.put("b", 2);
    assert!(cache.get(&"a").is_some());
    cache.put("c", 3);

    assert!(cache.get(&"b").is_none());
    assert_eq!(cache.get(&"a").map(|v| *v), Some(1));
    assert_eq!(cache.get(&"c").map(|v| *v), Some(3));
}

#[test]
fn cost_bound_enforced_in_background() {
    let cache: MemoryCache<&str, Vec<u8>> = MemoryCache::builder()
        .cost_limit(10)
        .auto_trim_interval(Duration::from_millis(50))
        .build();

    cache.put_with_cost("x", vec![0u8; 6], 6);
    cache.put_with_cost("y", vec![0u8; 6], 6);

    assert!(wait_until(Duration::from_secs(3), || cache.total_cost() <= 10));
    assert!(!cache.contains(&"x"), "older entry should be evicted first");
    assert!(cache.contains(&"y"));
    cache.check_invariants().unwrap();
}

#[test]
fn age_bound_enforced_by_sweeper() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .age_limit(Duration::from_millis(80))
        .auto_trim_interval(Duration::from_millis(40))
        .build();

    cache.put("k", 1);
    assert!(cache.contains(&"k"));

    assert!(wait_until(Duration::from_secs(3), || !cache.contains(&"k")));
    assert_eq!(cache.total_count(), 0);
}

#[test]
fn replace_updates_cost_not_accumulates() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put_with_cost("k", 1, 5);
    cache.put_with_cost("k", 2, 2);

    assert_eq!(cache.total_cost(), 2);
    assert_eq!(cache.total_count(), 1);
    assert_eq!(cache.get(&"k").map(|v| *v), Some(2));
}

#[test]
fn memory_warning_purges_when_policy_set() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .purge_on_memory_warning(true)
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("a", 1);
    cache.put("b", 2);
    cache.on_memory_warning();

    assert_eq!(cache.total_count(), 0);
}

// ==============================================
// Behavioral Laws
// ==============================================

#[test]
fn recency_order_is_tail_first_eviction_order() {
    let cache: MemoryCache<u32, u32> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put(1, 10);
    cache.put(2, 20);
    cache.put(3, 30);

    // Tail is key 1.
    cache.trim_to_count(2);
    assert!(!cache.contains(&1));
    assert!(cache.contains(&2));
    assert!(cache.contains(&3));

    // get(2) refreshes it; tail becomes key 3.
    assert!(cache.get(&2).is_some());
    cache.trim_to_count(1);
    assert!(!cache.contains(&3));
    assert!(cache.contains(&2));
}

#[test]
fn remove_is_idempotent() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put_with_cost("k", 1, 7);
    cache.remove(&"k");
    let after_first = (cache.total_count(), cache.total_cost());
    cache.remove(&"k");

    assert_eq!((cache.total_count(), cache.total_cost()), after_first);
    assert_eq!(after_first, (0, 0));
    cache.check_invariants().unwrap();
}

#[test]
fn count_limit_lowered_at_runtime_is_enforced_by_sweeper() {
    let cache: MemoryCache<u32, u32> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_millis(50))
        .build();

    for i in 0..10 {
        cache.put(i, i);
    }
    assert_eq!(cache.total_count(), 10);

    cache.set_count_limit(3);
    assert!(wait_until(Duration::from_secs(3), || cache.total_count() <= 3));

    // Survivors are the three most recently inserted.
    assert!(cache.contains(&9));
    assert!(cache.contains(&8));
    assert!(cache.contains(&7));
    cache.check_invariants().unwrap();
}

#[test]
fn trim_to_age_keeps_fresh_entries() {
    let cache: MemoryCache<&str, i32> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("stale", 1);
    thread::sleep(Duration::from_millis(80));
    cache.put("fresh", 2);

    cache.trim_to_age(Duration::from_millis(40));
    assert!(!cache.contains(&"stale"));
    assert!(cache.contains(&"fresh"));
}

// ==============================================
// Release Routing
// ==============================================

#[test]
fn inline_release_drops_at_the_access_site() {
    let drops = Arc::new(AtomicUsize::new(0));
    let cache: MemoryCache<&str, Tracked> = MemoryCache::builder()
        .release_asynchronously(false)
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("k", Tracked(Arc::clone(&drops)));
    cache.remove(&"k");

    // Synchronous: the drop already happened on this thread.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn asynchronous_release_drops_off_thread() {
    let drops = Arc::new(AtomicUsize::new(0));
    let cache: MemoryCache<u32, Tracked> = MemoryCache::builder()
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    for i in 0..8 {
        cache.put(i, Tracked(Arc::clone(&drops)));
    }
    cache.remove_all();

    assert_eq!(cache.total_count(), 0);
    assert!(wait_until(Duration::from_secs(5), || {
        drops.load(Ordering::SeqCst) == 8
    }));
}

#[test]
fn main_thread_queue_receives_batches_until_drained() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut builder = MemoryCache::<&str, Tracked>::builder()
        .release_on_main_thread(true)
        .auto_trim_interval(Duration::from_secs(60));
    let queue = builder.main_thread_queue();
    let cache = builder.build();

    cache.put("a", Tracked(Arc::clone(&drops)));
    cache.put("b", Tracked(Arc::clone(&drops)));
    cache.remove_all();

    // Nothing is dropped until the owner drains on its designated thread.
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(queue.drain(), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

#[test]
fn replaced_value_travels_the_release_path() {
    let drops = Arc::new(AtomicUsize::new(0));
    let cache: MemoryCache<&str, Tracked> = MemoryCache::builder()
        .release_asynchronously(false)
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("k", Tracked(Arc::clone(&drops)));
    cache.put("k", Tracked(Arc::clone(&drops)));

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(cache.total_count(), 1);
}

#[test]
fn evicted_value_stays_alive_while_reader_holds_it() {
    let drops = Arc::new(AtomicUsize::new(0));
    let cache: MemoryCache<&str, Tracked> = MemoryCache::builder()
        .release_asynchronously(false)
        .auto_trim_interval(Duration::from_secs(60))
        .build();

    cache.put("k", Tracked(Arc::clone(&drops)));
    let held = cache.get(&"k").unwrap();
    cache.remove(&"k");

    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(held);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}
