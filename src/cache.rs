//! The LRU cache engine.
//!
//! [`MemoryCache`] is a thread-safe in-process key-value cache with
//! deterministic LRU eviction, bounded along three independent dimensions:
//! entry count, aggregate cost, and entry age.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                       MemoryCache<K, V>                           │
//!   │                   (cheap-to-clone Arc handle)                     │
//!   │                                                                   │
//!   │   ┌───────────────────────────────────────────────────────────┐   │
//!   │   │              Mutex<CacheState<K, V>>                      │   │
//!   │   │                                                           │   │
//!   │   │   RecencyIndex<K, V>      CacheConfig<K, V>               │   │
//!   │   │   (list + index +         (limits, flags, callbacks)      │   │
//!   │   │    count/cost sums)                                       │   │
//!   │   └───────────────────────────────────────────────────────────┘   │
//!   │            │                            │                         │
//!   │            ▼ evicted entries            ▼ trim jobs               │
//!   │   ┌─────────────────────┐      ┌─────────────────────┐            │
//!   │   │ release queue /     │      │ serial trim worker  │◄─ sweeper  │
//!   │   │ main-thread queue / │      │ (cost │ count │ age)│   (timer)  │
//!   │   │ inline drop         │      └─────────────────────┘            │
//!   │   └─────────────────────┘                                        │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Access Methods
//!
//! | Method              | Lock  | Recency | Description                        |
//! |---------------------|-------|---------|------------------------------------|
//! | `contains(&k)`      | brief | no      | Presence check                     |
//! | `get(&k)`           | brief | yes     | Returns `Arc<V>`, moves to MRU     |
//! | `peek(&k)`          | brief | no      | Returns `Arc<V>` without reorder   |
//! | `put(k, v)`         | brief | yes     | Insert/replace with cost 0         |
//! | `put_with_cost`     | brief | yes     | Insert/replace with explicit cost  |
//! | `remove(&k)`        | brief | -       | Unlink, defer value drop           |
//! | `remove_all()`      | O(1)  | -       | Swap out the whole index           |
//! | `trim_to_*`         | coop. | -       | Evict tail-first down to a bound   |
//!
//! ## Soft Bounds
//!
//! The limits are deliberately soft. `put` reacts to a count overshoot with
//! a single inline tail pop and to a cost overshoot by scheduling a
//! background trim; the periodic sweeper is the canonical enforcer of the
//! cost and age bounds. The hot path therefore never runs an unbounded
//! eviction loop.
//!
//! ## Cooperative Trimming
//!
//! The trim loops never hold the cache lock across more than one eviction:
//! each iteration try-locks, pops at most one tail entry into a local
//! holder, and unlocks; on contention they back off ~10 ms. Foreground
//! operations wait at most O(1) work behind a trim of any size. The holder
//! is handed to the release path only after the loop ends, so value
//! destructors never run under the lock.
//!
//! ## Thread Safety
//!
//! All methods are callable from any thread. A single non-recursive mutex
//! serializes index and configuration access; notification callbacks are
//! invoked outside the lock.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::builder::MemoryCacheBuilder;
use crate::ds::recency::RecencyIndex;
use crate::error::InvariantError;
use crate::release::{ReleaseBatch, ReleaseQueue};
use crate::sweeper::TrimJob;

/// Notification hook invoked with the cache handle, outside the cache lock.
pub type CacheCallback<K, V> = Arc<dyn Fn(&MemoryCache<K, V>) + Send + Sync>;

/// Back-off applied by the cooperative trim loop when the cache lock is
/// contended. A fairness knob, not a correctness requirement.
const TRIM_LOCK_BACKOFF: Duration = Duration::from_millis(10);

pub(crate) struct CacheConfig<K, V> {
    pub(crate) name: Option<String>,
    pub(crate) count_limit: usize,
    pub(crate) cost_limit: u64,
    pub(crate) age_limit: Duration,
    pub(crate) auto_trim_interval: Duration,
    pub(crate) purge_on_memory_warning: bool,
    pub(crate) purge_on_enter_background: bool,
    pub(crate) release_on_main_thread: bool,
    pub(crate) release_asynchronously: bool,
    pub(crate) memory_warning_callback: Option<CacheCallback<K, V>>,
    pub(crate) enter_background_callback: Option<CacheCallback<K, V>>,
}

impl<K, V> Default for CacheConfig<K, V> {
    fn default() -> Self {
        Self {
            name: None,
            count_limit: usize::MAX,
            cost_limit: u64::MAX,
            age_limit: Duration::MAX,
            auto_trim_interval: Duration::from_secs(5),
            purge_on_memory_warning: true,
            purge_on_enter_background: true,
            release_on_main_thread: false,
            release_asynchronously: true,
            memory_warning_callback: None,
            enter_background_callback: None,
        }
    }
}

pub(crate) struct CacheState<K, V> {
    pub(crate) index: RecencyIndex<K, V>,
    pub(crate) config: CacheConfig<K, V>,
}

pub(crate) struct CacheInner<K, V> {
    state: Mutex<CacheState<K, V>>,
    release: ReleaseQueue<K, V>,
    main_queue: Option<flume::Sender<ReleaseBatch<K, V>>>,
    trim_queue: flume::Sender<TrimJob>,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        config: CacheConfig<K, V>,
        release: ReleaseQueue<K, V>,
        main_queue: Option<flume::Sender<ReleaseBatch<K, V>>>,
        trim_queue: flume::Sender<TrimJob>,
    ) -> Self {
        Self {
            state: Mutex::new(CacheState {
                index: RecencyIndex::new(),
                config,
            }),
            release,
            main_queue,
            trim_queue,
        }
    }

    pub(crate) fn auto_trim_interval(&self) -> Duration {
        self.state.lock().config.auto_trim_interval
    }

    pub(crate) fn schedule_trim(&self, job: TrimJob) -> bool {
        self.trim_queue.send(job).is_ok()
    }

    /// Routes a batch per the release flags. Must not be called while
    /// holding the cache lock.
    fn release(&self, batch: ReleaseBatch<K, V>) {
        if batch.is_empty() {
            return;
        }
        let (on_main, asynchronously) = {
            let state = self.state.lock();
            (
                state.config.release_on_main_thread,
                state.config.release_asynchronously,
            )
        };
        let mut batch = batch;
        if on_main {
            if let Some(tx) = &self.main_queue {
                match tx.send(batch) {
                    Ok(()) => return,
                    // Drain handle is gone; fall back to the default path.
                    Err(flume::SendError(returned)) => batch = returned,
                }
            }
        }
        if asynchronously {
            self.release.submit(batch);
        } else {
            drop(batch);
        }
    }

    pub(crate) fn trim_over_cost(&self) {
        let limit = self.state.lock().config.cost_limit;
        self.trim_to_cost(limit);
    }

    pub(crate) fn trim_pass(&self) {
        let (cost_limit, count_limit, age_limit) = {
            let state = self.state.lock();
            (
                state.config.cost_limit,
                state.config.count_limit,
                state.config.age_limit,
            )
        };
        self.trim_to_cost(cost_limit);
        self.trim_to_count(count_limit);
        self.trim_to_age(age_limit);
    }

    pub(crate) fn trim_to_cost(&self, limit: u64) {
        if limit == 0 {
            let holder = self.state.lock().index.clear();
            self.release(ReleaseBatch::index(holder));
            return;
        }
        {
            let state = self.state.lock();
            if state.index.total_cost() <= limit {
                return;
            }
        }
        let mut holder = Vec::new();
        let mut finished = false;
        while !finished {
            if let Some(mut state) = self.state.try_lock() {
                if state.index.total_cost() > limit {
                    match state.index.pop_tail() {
                        Some(entry) => holder.push(entry),
                        None => finished = true,
                    }
                } else {
                    finished = true;
                }
            } else {
                thread::sleep(TRIM_LOCK_BACKOFF);
            }
        }
        if !holder.is_empty() {
            self.release(ReleaseBatch::entries(holder));
        }
    }

    pub(crate) fn trim_to_count(&self, limit: usize) {
        if limit == 0 {
            let holder = self.state.lock().index.clear();
            self.release(ReleaseBatch::index(holder));
            return;
        }
        {
            let state = self.state.lock();
            if state.index.total_count() <= limit {
                return;
            }
        }
        let mut holder = Vec::new();
        let mut finished = false;
        while !finished {
            if let Some(mut state) = self.state.try_lock() {
                if state.index.total_count() > limit {
                    match state.index.pop_tail() {
                        Some(entry) => holder.push(entry),
                        None => finished = true,
                    }
                } else {
                    finished = true;
                }
            } else {
                thread::sleep(TRIM_LOCK_BACKOFF);
            }
        }
        if !holder.is_empty() {
            self.release(ReleaseBatch::entries(holder));
        }
    }

    pub(crate) fn trim_to_age(&self, max_age: Duration) {
        if max_age.is_zero() {
            let holder = self.state.lock().index.clear();
            self.release(ReleaseBatch::index(holder));
            return;
        }
        // One clock reading for the whole pass; the list's own order breaks
        // ties among entries with equal timestamps.
        let now = Instant::now();
        {
            let state = self.state.lock();
            if !tail_expired(&state.index, now, max_age) {
                return;
            }
        }
        let mut holder = Vec::new();
        let mut finished = false;
        while !finished {
            if let Some(mut state) = self.state.try_lock() {
                if tail_expired(&state.index, now, max_age) {
                    match state.index.pop_tail() {
                        Some(entry) => holder.push(entry),
                        None => finished = true,
                    }
                } else {
                    finished = true;
                }
            } else {
                thread::sleep(TRIM_LOCK_BACKOFF);
            }
        }
        if !holder.is_empty() {
            self.release(ReleaseBatch::entries(holder));
        }
    }
}

fn tail_expired<K, V>(index: &RecencyIndex<K, V>, now: Instant, max_age: Duration) -> bool {
    match index.tail_accessed_at() {
        Some(accessed_at) => now.duration_since(accessed_at) > max_age,
        None => false,
    }
}

/// Thread-safe in-process LRU cache bounded by entry count, aggregate cost,
/// and entry age.
///
/// `MemoryCache` is a cheap-to-clone handle; clones share the same storage.
/// Values are stored as `Arc<V>` and handed out as clones, so readers can
/// hold a value after it has been evicted.
///
/// All limits are soft: the cache may briefly exceed them between the
/// offending operation and the next trim pass (see the module docs).
///
/// # Example
///
/// ```
/// use memkit::cache::MemoryCache;
///
/// let cache: MemoryCache<String, Vec<u8>> = MemoryCache::builder()
///     .count_limit(2)
///     .build();
///
/// cache.put("a".to_string(), vec![1]);
/// cache.put("b".to_string(), vec![2]);
/// cache.put("c".to_string(), vec![3]); // count overshoot evicts "a"
///
/// assert!(cache.get(&"a".to_string()).is_none());
/// assert_eq!(cache.get(&"b".to_string()).map(|v| v[0]), Some(2));
/// ```
pub struct MemoryCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache with default configuration: all limits unbounded, a
    /// 5-second auto-trim interval, purge-on-warning and
    /// purge-on-background enabled, asynchronous release enabled.
    pub fn new() -> Self {
        MemoryCacheBuilder::new().build()
    }

    /// Returns a builder for non-default configuration.
    pub fn builder() -> MemoryCacheBuilder<K, V> {
        MemoryCacheBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<CacheInner<K, V>>) -> Self {
        Self { inner }
    }

    // -- Access methods ---------------------------------------------------

    /// Returns whether `key` is present. Does not affect recency order.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.state.lock().index.contains(key)
    }

    /// Returns the value for `key`, refreshing its timestamp and moving it
    /// to the MRU position. This is a mutating read: recency order changes.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let now = Instant::now();
        self.inner.state.lock().index.touch(key, now)
    }

    /// Returns the value for `key` without affecting recency order or the
    /// entry's timestamp.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.inner.state.lock().index.peek(key)
    }

    /// Inserts or replaces the value for `key` with cost 0.
    pub fn put(&self, key: K, value: V) {
        self.put_with_cost(key, value, 0);
    }

    /// Inserts or replaces the value for `key`, associating the given cost.
    ///
    /// Replacing an existing entry adjusts the aggregate cost by the delta
    /// between old and new cost, refreshes the timestamp, and moves the
    /// entry to the MRU position. A count overshoot is corrected inline
    /// with a single tail pop; a cost overshoot schedules a background trim.
    pub fn put_with_cost(&self, key: K, value: V, cost: u64) {
        let value = Arc::new(value);
        let now = Instant::now();
        let replaced;
        let mut evicted = None;
        let mut over_cost = false;
        {
            let mut state = self.inner.state.lock();
            replaced = state.index.upsert(key, value, cost, now);
            if state.index.total_cost() > state.config.cost_limit {
                over_cost = true;
            }
            if state.index.total_count() > state.config.count_limit {
                // A single insert starting at-or-under the limit overshoots
                // by at most one, so one tail pop restores the bound.
                evicted = state.index.pop_tail();
            }
        }
        if let Some(old) = replaced {
            self.inner.release(ReleaseBatch::value(old));
        }
        if let Some(entry) = evicted {
            self.inner.release(ReleaseBatch::entry(entry));
        }
        if over_cost {
            self.inner.schedule_trim(TrimJob::CostOverflow);
        }
    }

    /// Removes the entry for `key`, if present. The value's drop is routed
    /// through the release path. Removing an absent key is a no-op.
    pub fn remove(&self, key: &K) {
        let removed = self.inner.state.lock().index.remove(key);
        if let Some(entry) = removed {
            self.inner.release(ReleaseBatch::entry(entry));
        }
    }

    /// Empties the cache immediately. The populated index is swapped out in
    /// O(1) and destroyed through the release path.
    pub fn remove_all(&self) {
        let holder = self.inner.state.lock().index.clear();
        if !holder.is_empty() {
            self.inner.release(ReleaseBatch::index(holder));
        }
    }

    // -- Trim -------------------------------------------------------------

    /// Evicts LRU entries until `total_count <= count`. `count == 0` is
    /// equivalent to [`remove_all`](Self::remove_all).
    pub fn trim_to_count(&self, count: usize) {
        self.inner.trim_to_count(count);
    }

    /// Evicts LRU entries until `total_cost <= cost`. `cost == 0` is
    /// equivalent to [`remove_all`](Self::remove_all).
    pub fn trim_to_cost(&self, cost: u64) {
        self.inner.trim_to_cost(cost);
    }

    /// Evicts entries whose last access is older than `max_age`. A zero age
    /// is equivalent to [`remove_all`](Self::remove_all).
    pub fn trim_to_age(&self, max_age: Duration) {
        self.inner.trim_to_age(max_age);
    }

    // -- Snapshots ---------------------------------------------------------

    /// The number of entries currently present.
    pub fn total_count(&self) -> usize {
        self.inner.state.lock().index.total_count()
    }

    /// The sum of the costs of the entries currently present.
    ///
    /// Read under the same lock as [`total_count`](Self::total_count), so a
    /// pair of snapshot reads taken while no writer intervenes is
    /// consistent.
    pub fn total_cost(&self) -> u64 {
        self.inner.state.lock().index.total_cost()
    }

    // -- Configuration -----------------------------------------------------

    /// The cache's debug label.
    pub fn name(&self) -> Option<String> {
        self.inner.state.lock().config.name.clone()
    }

    /// Sets the cache's debug label.
    pub fn set_name(&self, name: impl Into<String>) {
        self.inner.state.lock().config.name = Some(name.into());
    }

    /// The maximum number of entries. Default `usize::MAX` (unbounded).
    pub fn count_limit(&self) -> usize {
        self.inner.state.lock().config.count_limit
    }

    /// Sets the entry-count soft limit. Enforcement happens on the next
    /// overshooting `put` or trim pass.
    pub fn set_count_limit(&self, limit: usize) {
        self.inner.state.lock().config.count_limit = limit;
    }

    /// The maximum aggregate cost. Default `u64::MAX` (unbounded).
    pub fn cost_limit(&self) -> u64 {
        self.inner.state.lock().config.cost_limit
    }

    /// Sets the aggregate-cost soft limit.
    pub fn set_cost_limit(&self, limit: u64) {
        self.inner.state.lock().config.cost_limit = limit;
    }

    /// The maximum entry age. Default `Duration::MAX` (unbounded).
    pub fn age_limit(&self) -> Duration {
        self.inner.state.lock().config.age_limit
    }

    /// Sets the entry-age soft limit, enforced by the periodic sweeper.
    pub fn set_age_limit(&self, limit: Duration) {
        self.inner.state.lock().config.age_limit = limit;
    }

    /// The sweeper period. Default 5 seconds.
    pub fn auto_trim_interval(&self) -> Duration {
        self.inner.state.lock().config.auto_trim_interval
    }

    /// Sets the sweeper period. A zero interval is ignored: the sweeper
    /// would spin.
    pub fn set_auto_trim_interval(&self, interval: Duration) {
        if interval.is_zero() {
            tracing::warn!("[cache] ignoring zero auto-trim interval");
            return;
        }
        self.inner.state.lock().config.auto_trim_interval = interval;
    }

    /// Whether [`on_memory_warning`](Self::on_memory_warning) empties the
    /// cache. Default `true`.
    pub fn purge_on_memory_warning(&self) -> bool {
        self.inner.state.lock().config.purge_on_memory_warning
    }

    /// Sets the memory-warning purge policy.
    pub fn set_purge_on_memory_warning(&self, purge: bool) {
        self.inner.state.lock().config.purge_on_memory_warning = purge;
    }

    /// Whether [`on_enter_background`](Self::on_enter_background) empties
    /// the cache. Default `true`.
    pub fn purge_on_enter_background(&self) -> bool {
        self.inner.state.lock().config.purge_on_enter_background
    }

    /// Sets the enter-background purge policy.
    pub fn set_purge_on_enter_background(&self, purge: bool) {
        self.inner.state.lock().config.purge_on_enter_background = purge;
    }

    /// Whether evicted values are routed to the main-thread queue. Default
    /// `false`.
    pub fn release_on_main_thread(&self) -> bool {
        self.inner.state.lock().config.release_on_main_thread
    }

    /// Sets main-thread release routing. Takes effect only when a
    /// main-thread queue was registered at build time; otherwise the flag
    /// degrades to the asynchronous path.
    pub fn set_release_on_main_thread(&self, on_main: bool) {
        self.inner.state.lock().config.release_on_main_thread = on_main;
    }

    /// Whether evicted values are dropped on a background thread rather
    /// than at the access site. Default `true`.
    pub fn release_asynchronously(&self) -> bool {
        self.inner.state.lock().config.release_asynchronously
    }

    /// Sets asynchronous release. When disabled, evicted values are dropped
    /// inline by whichever call evicted them (still outside the lock).
    pub fn set_release_asynchronously(&self, asynchronously: bool) {
        self.inner.state.lock().config.release_asynchronously = asynchronously;
    }

    /// Sets the hook invoked by [`on_memory_warning`](Self::on_memory_warning),
    /// before any purge. Pass `None` to clear.
    pub fn set_memory_warning_callback(&self, callback: Option<CacheCallback<K, V>>) {
        self.inner.state.lock().config.memory_warning_callback = callback;
    }

    /// Sets the hook invoked by [`on_enter_background`](Self::on_enter_background),
    /// before any purge. Pass `None` to clear.
    pub fn set_enter_background_callback(&self, callback: Option<CacheCallback<K, V>>) {
        self.inner.state.lock().config.enter_background_callback = callback;
    }

    // -- External signals --------------------------------------------------

    /// Entry point for the host's low-memory signal: invokes the
    /// memory-warning callback (outside the lock), then empties the cache
    /// if the corresponding purge policy is set.
    pub fn on_memory_warning(&self) {
        let (callback, purge) = {
            let state = self.inner.state.lock();
            (
                state.config.memory_warning_callback.clone(),
                state.config.purge_on_memory_warning,
            )
        };
        if let Some(callback) = callback {
            callback(self);
        }
        if purge {
            self.remove_all();
        }
    }

    /// Entry point for the host's backgrounded signal: invokes the
    /// enter-background callback (outside the lock), then empties the cache
    /// if the corresponding purge policy is set.
    pub fn on_enter_background(&self) {
        let (callback, purge) = {
            let state = self.inner.state.lock();
            (
                state.config.enter_background_callback.clone(),
                state.config.purge_on_enter_background,
            )
        };
        if let Some(callback) = callback {
            callback(self);
        }
        if purge {
            self.remove_all();
        }
    }

    // -- Diagnostics -------------------------------------------------------

    /// Validates the internal structural invariants. Intended for tests and
    /// fuzzing.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.state.lock().index.check_invariants()
    }
}

impl<K, V> Clone for MemoryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for MemoryCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryCache")
            .field("name", &state.config.name)
            .field("total_count", &state.index.total_count())
            .field("total_cost", &state.index.total_cost())
            .finish_non_exhaustive()
    }
}
