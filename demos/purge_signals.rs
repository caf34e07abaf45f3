use std::time::Duration;

use memkit::cache::MemoryCache;

fn main() {
    let cache: MemoryCache<&str, Vec<u8>> = MemoryCache::builder()
        .name("artifacts")
        .cost_limit(1 << 20)
        .auto_trim_interval(Duration::from_secs(1))
        .memory_warning_callback(|cache| {
            println!(
                "memory warning with {} entries / {} bytes cached",
                cache.total_count(),
                cache.total_cost()
            );
        })
        .build();

    cache.put_with_cost("doc", vec![0u8; 4096], 4096);
    cache.put_with_cost("thumb", vec![0u8; 1024], 1024);

    // The host platform would call this from its low-memory hook.
    cache.on_memory_warning();

    println!("after purge: {} entries", cache.total_count());
}

// Expected output:
// memory warning with 2 entries / 5120 bytes cached
// after purge: 0 entries
