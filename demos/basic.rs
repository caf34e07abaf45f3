use std::time::Duration;

use memkit::cache::MemoryCache;

fn main() {
    let cache: MemoryCache<u32, String> = MemoryCache::builder()
        .name("demo")
        .count_limit(2)
        .auto_trim_interval(Duration::from_secs(1))
        .build();

    cache.put(1, "alpha".to_string());
    cache.put(2, "beta".to_string());

    if let Some(value) = cache.get(&1) {
        println!("hit 1: {}", value.as_str());
    }

    cache.put(3, "gamma".to_string());

    println!("contains 2? {}", cache.contains(&2));
}

// Expected output:
// hit 1: alpha
// contains 2? false
//
// Explanation: count_limit=2; after get(&1), key 1 is MRU and key 2 is LRU.
// Inserting key 3 overshoots the count limit, so the LRU tail (key 2) is
// evicted inline and contains(2) is false.
