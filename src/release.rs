//! Deferred value release.
//!
//! Destroying a cached value can be arbitrarily expensive (large buffers,
//! deep trees), so evicted entries are never dropped under the cache lock.
//! Instead they are wrapped in an opaque [`ReleaseBatch`] holder and routed
//! to one of three destinations chosen by configuration:
//!
//! - the background **release queue** (`release_asynchronously`, the
//!   default): dedicated threads receive batches over a channel and drop
//!   them off the hot path;
//! - a caller-drained [`MainThreadQueue`] (`release_on_main_thread`): for
//!   values with thread affinity, the caller pulls batches and drops them on
//!   its designated thread;
//! - inline at the access site, when asynchronous release is disabled.
//!
//! Dropping a `ReleaseBatch` is what performs the destruction; the holder
//! itself does no work until then.

use std::sync::Arc;
use std::thread;

use crate::ds::recency::{CacheEntry, RecencyIndex};

enum BatchInner<K, V> {
    Value(Arc<V>),
    Entry(CacheEntry<K, V>),
    Entries(Vec<CacheEntry<K, V>>),
    Index(RecencyIndex<K, V>),
}

/// Opaque holder for values awaiting destruction.
///
/// May carry a single replaced value, one evicted entry, a trim pass's worth
/// of entries, or an entire swapped-out index from `remove_all`.
pub struct ReleaseBatch<K, V>(BatchInner<K, V>);

impl<K, V> ReleaseBatch<K, V> {
    pub(crate) fn value(value: Arc<V>) -> Self {
        Self(BatchInner::Value(value))
    }

    pub(crate) fn entry(entry: CacheEntry<K, V>) -> Self {
        Self(BatchInner::Entry(entry))
    }

    pub(crate) fn entries(entries: Vec<CacheEntry<K, V>>) -> Self {
        Self(BatchInner::Entries(entries))
    }

    pub(crate) fn index(index: RecencyIndex<K, V>) -> Self {
        Self(BatchInner::Index(index))
    }

    /// Number of values this batch will drop.
    pub fn len(&self) -> usize {
        match &self.0 {
            BatchInner::Value(_) | BatchInner::Entry(_) => 1,
            BatchInner::Entries(entries) => entries.len(),
            BatchInner::Index(index) => index.total_count(),
        }
    }

    /// Returns `true` if the batch holds nothing to drop.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background release executor: named threads draining a channel of batches.
pub(crate) struct ReleaseQueue<K, V> {
    tx: flume::Sender<ReleaseBatch<K, V>>,
}

impl<K, V> ReleaseQueue<K, V>
where
    K: Send + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(threads: usize) -> Self {
        let (tx, rx) = flume::unbounded::<ReleaseBatch<K, V>>();
        for _ in 0..threads {
            let rx = rx.clone();
            thread::Builder::new()
                .name("memkit-release".to_string())
                .spawn(move || run(rx))
                .expect("failed to spawn release thread");
        }
        Self { tx }
    }

    /// Hands a batch to the background threads. If they are gone (shutdown),
    /// the batch is dropped right here.
    pub(crate) fn submit(&self, batch: ReleaseBatch<K, V>) {
        let _ = self.tx.send(batch);
    }
}

fn run<K, V>(rx: flume::Receiver<ReleaseBatch<K, V>>) {
    while let Ok(batch) = rx.recv() {
        drop(batch);
        for backlog in rx.drain() {
            drop(backlog);
        }
    }
    tracing::debug!("[release] queue disconnected, exiting");
}

/// Caller-drained release destination for values with thread affinity.
///
/// Created through
/// [`MemoryCacheBuilder::main_thread_queue`](crate::builder::MemoryCacheBuilder::main_thread_queue).
/// While `release_on_main_thread` is set on the cache, evicted batches are
/// routed here instead of to the background threads; the owner calls
/// [`drain`](Self::drain) from whatever thread must perform the drops.
///
/// ```
/// use memkit::cache::MemoryCache;
///
/// let mut builder = MemoryCache::<String, Vec<u8>>::builder().release_on_main_thread(true);
/// let queue = builder.main_thread_queue();
/// let cache = builder.build();
///
/// cache.put("frame".to_string(), vec![0u8; 1024]);
/// cache.remove(&"frame".to_string());
///
/// // On the designated thread:
/// let released = queue.drain();
/// assert_eq!(released, 1);
/// ```
pub struct MainThreadQueue<K, V> {
    rx: flume::Receiver<ReleaseBatch<K, V>>,
}

impl<K, V> MainThreadQueue<K, V> {
    pub(crate) fn channel() -> (flume::Sender<ReleaseBatch<K, V>>, Self) {
        let (tx, rx) = flume::unbounded();
        (tx, Self { rx })
    }

    /// Drops every batch currently queued; returns the number of values
    /// released.
    pub fn drain(&self) -> usize {
        let mut released = 0;
        for batch in self.rx.try_iter() {
            released += batch.len();
            drop(batch);
        }
        released
    }

    /// Returns `true` if no batches are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
