//! Construction surface for [`MemoryCache`].
//!
//! Every configuration field can also be changed after construction through
//! the cache's setters; the builder exists so a cache starts life with the
//! intended limits, and because the main-thread release queue and the
//! release-thread count can only be chosen before the background threads
//! spawn.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use memkit::builder::MemoryCacheBuilder;
//!
//! let cache = MemoryCacheBuilder::<String, Vec<u8>>::new()
//!     .name("decoded-images")
//!     .count_limit(512)
//!     .cost_limit(64 * 1024 * 1024)
//!     .age_limit(Duration::from_secs(12 * 60 * 60))
//!     .build();
//!
//! cache.put_with_cost("hero.png".to_string(), vec![0u8; 1_024], 1_024);
//! assert_eq!(cache.total_cost(), 1_024);
//! ```

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheCallback, CacheConfig, CacheInner, MemoryCache};
use crate::error::ConfigError;
use crate::release::{MainThreadQueue, ReleaseBatch, ReleaseQueue};
use crate::sweeper;

/// Builder for [`MemoryCache`] instances.
pub struct MemoryCacheBuilder<K, V> {
    config: CacheConfig<K, V>,
    release_threads: usize,
    main_queue: Option<flume::Sender<ReleaseBatch<K, V>>>,
}

impl<K, V> MemoryCacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            release_threads: 1,
            main_queue: None,
        }
    }

    /// Debug label for the cache.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Entry-count soft limit. Default `usize::MAX` (unbounded).
    pub fn count_limit(mut self, limit: usize) -> Self {
        self.config.count_limit = limit;
        self
    }

    /// Aggregate-cost soft limit. Default `u64::MAX` (unbounded).
    pub fn cost_limit(mut self, limit: u64) -> Self {
        self.config.cost_limit = limit;
        self
    }

    /// Entry-age soft limit. Default `Duration::MAX` (unbounded).
    pub fn age_limit(mut self, limit: Duration) -> Self {
        self.config.age_limit = limit;
        self
    }

    /// Sweeper period. Default 5 seconds; must be non-zero.
    pub fn auto_trim_interval(mut self, interval: Duration) -> Self {
        self.config.auto_trim_interval = interval;
        self
    }

    /// Whether `on_memory_warning` empties the cache. Default `true`.
    pub fn purge_on_memory_warning(mut self, purge: bool) -> Self {
        self.config.purge_on_memory_warning = purge;
        self
    }

    /// Whether `on_enter_background` empties the cache. Default `true`.
    pub fn purge_on_enter_background(mut self, purge: bool) -> Self {
        self.config.purge_on_enter_background = purge;
        self
    }

    /// Route evicted values to the main-thread queue. Default `false`.
    /// Register the queue itself with
    /// [`main_thread_queue`](Self::main_thread_queue).
    pub fn release_on_main_thread(mut self, on_main: bool) -> Self {
        self.config.release_on_main_thread = on_main;
        self
    }

    /// Drop evicted values on a background thread rather than at the access
    /// site. Default `true`.
    pub fn release_asynchronously(mut self, asynchronously: bool) -> Self {
        self.config.release_asynchronously = asynchronously;
        self
    }

    /// Number of background release threads. Default 1; must be at least 1.
    pub fn release_threads(mut self, threads: usize) -> Self {
        self.release_threads = threads;
        self
    }

    /// Hook invoked by `on_memory_warning`, before any purge.
    pub fn memory_warning_callback(
        mut self,
        callback: impl Fn(&MemoryCache<K, V>) + Send + Sync + 'static,
    ) -> Self {
        self.config.memory_warning_callback = Some(Arc::new(callback) as CacheCallback<K, V>);
        self
    }

    /// Hook invoked by `on_enter_background`, before any purge.
    pub fn enter_background_callback(
        mut self,
        callback: impl Fn(&MemoryCache<K, V>) + Send + Sync + 'static,
    ) -> Self {
        self.config.enter_background_callback = Some(Arc::new(callback) as CacheCallback<K, V>);
        self
    }

    /// Registers and returns the caller-drained release queue used while
    /// `release_on_main_thread` is set. Call at most once; a later call
    /// replaces the earlier registration.
    pub fn main_thread_queue(&mut self) -> MainThreadQueue<K, V> {
        let (tx, queue) = MainThreadQueue::channel();
        self.main_queue = Some(tx);
        queue
    }

    /// Builds the cache, validating the configuration.
    pub fn try_build(self) -> Result<MemoryCache<K, V>, ConfigError> {
        if self.config.auto_trim_interval.is_zero() {
            return Err(ConfigError::new("auto trim interval must be non-zero"));
        }
        if self.release_threads == 0 {
            return Err(ConfigError::new("release thread count must be at least 1"));
        }

        let (trim_tx, trim_rx) = flume::unbounded();
        let inner = Arc::new(CacheInner::new(
            self.config,
            ReleaseQueue::new(self.release_threads),
            self.main_queue,
            trim_tx,
        ));
        sweeper::spawn_trim_worker(&inner, trim_rx);
        sweeper::spawn_sweeper(&inner);
        Ok(MemoryCache::from_inner(inner))
    }

    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// Panics if an explicitly set parameter is invalid (see
    /// [`try_build`](Self::try_build)); the defaults always build.
    pub fn build(self) -> MemoryCache<K, V> {
        self.try_build().expect("invalid cache configuration")
    }
}

impl<K, V> Default for MemoryCacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cache: MemoryCache<String, i32> = MemoryCacheBuilder::new().build();
        assert_eq!(cache.count_limit(), usize::MAX);
        assert_eq!(cache.cost_limit(), u64::MAX);
        assert_eq!(cache.age_limit(), Duration::MAX);
        assert_eq!(cache.auto_trim_interval(), Duration::from_secs(5));
        assert!(cache.purge_on_memory_warning());
        assert!(cache.purge_on_enter_background());
        assert!(!cache.release_on_main_thread());
        assert!(cache.release_asynchronously());
        assert_eq!(cache.name(), None);
    }

    #[test]
    fn builder_settings_are_applied() {
        let cache: MemoryCache<u64, u64> = MemoryCacheBuilder::new()
            .name("built")
            .count_limit(8)
            .cost_limit(64)
            .age_limit(Duration::from_secs(1))
            .auto_trim_interval(Duration::from_secs(2))
            .purge_on_memory_warning(false)
            .release_asynchronously(false)
            .build();

        assert_eq!(cache.name().as_deref(), Some("built"));
        assert_eq!(cache.count_limit(), 8);
        assert_eq!(cache.cost_limit(), 64);
        assert_eq!(cache.age_limit(), Duration::from_secs(1));
        assert_eq!(cache.auto_trim_interval(), Duration::from_secs(2));
        assert!(!cache.purge_on_memory_warning());
        assert!(!cache.release_asynchronously());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = MemoryCacheBuilder::<u64, u64>::new()
            .auto_trim_interval(Duration::ZERO)
            .try_build()
            .unwrap_err();
        assert!(err.reason().contains("interval"));
    }

    #[test]
    fn zero_release_threads_is_rejected() {
        let err = MemoryCacheBuilder::<u64, u64>::new()
            .release_threads(0)
            .try_build()
            .unwrap_err();
        assert!(err.reason().contains("release thread"));
    }

    #[test]
    fn main_thread_queue_receives_evictions() {
        let mut builder = MemoryCacheBuilder::<String, i32>::new().release_on_main_thread(true);
        let queue = builder.main_thread_queue();
        let cache = builder.build();

        cache.put("k".to_string(), 1);
        cache.remove(&"k".to_string());

        assert_eq!(queue.drain(), 1);
    }
}
