//! Background trim machinery: the serial trim worker and the periodic
//! sweeper.
//!
//! The worker is the cache's serial work queue: one thread executing trim
//! jobs strictly in arrival order, so sweeper passes can never race with
//! the cost trims scheduled by `put`. The sweeper is a timer thread that
//! dispatches a full pass (cost → count → age) every `auto_trim_interval`.
//!
//! Both threads hold only a `Weak` back-reference to the engine: they must
//! not extend the cache's lifetime. When the cache is dropped the worker's
//! channel disconnects and the sweeper's next wakeup observes the missing
//! target; each exits silently.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::thread;

use crate::cache::CacheInner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrimJob {
    /// Cost overshoot detected by `put`; bring cost back under the limit.
    CostOverflow,
    /// Periodic pass over all three bounds: cost, then count, then age.
    FullPass,
}

pub(crate) fn spawn_trim_worker<K, V>(
    inner: &Arc<CacheInner<K, V>>,
    rx: flume::Receiver<TrimJob>,
) where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    let weak = Arc::downgrade(inner);
    thread::Builder::new()
        .name("memkit-trim".to_string())
        .spawn(move || trim_loop(weak, rx))
        .expect("failed to spawn trim worker thread");
}

fn trim_loop<K, V>(weak: Weak<CacheInner<K, V>>, rx: flume::Receiver<TrimJob>)
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    while let Ok(job) = rx.recv() {
        let Some(inner) = weak.upgrade() else { break };
        match job {
            TrimJob::CostOverflow => inner.trim_over_cost(),
            TrimJob::FullPass => inner.trim_pass(),
        }
    }
    tracing::debug!("[trim] queue disconnected, exiting");
}

pub(crate) fn spawn_sweeper<K, V>(inner: &Arc<CacheInner<K, V>>)
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    let weak = Arc::downgrade(inner);
    let mut interval = inner.auto_trim_interval();
    thread::Builder::new()
        .name("memkit-sweeper".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            let Some(inner) = weak.upgrade() else {
                tracing::debug!("[sweeper] cache dropped, exiting");
                break;
            };
            tracing::trace!("[sweeper] dispatching trim pass");
            if !inner.schedule_trim(TrimJob::FullPass) {
                break;
            }
            interval = inner.auto_trim_interval();
        })
        .expect("failed to spawn sweeper thread");
}
