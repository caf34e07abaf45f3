//! Coupled recency list + associative index.
//!
//! The LRU bookkeeping for the cache engine: a doubly linked list of entries
//! ordered by recency of access (MRU at the head, LRU at the tail) paired
//! with a hash index from key to list node. Nodes live in a [`SlotArena`]
//! and are linked by `SlotId`, enabling O(1) unlink/relink without raw
//! pointers.
//!
//! ## Architecture
//!
//! ```text
//!   map (FxHashMap<K, SlotId>)         arena (SlotArena<Node<K, V>>)
//!   ┌─────────┬────────┐               ┌────────┬─────────────────────────┐
//!   │   Key   │ SlotId │               │ SlotId │ Node { entry, prev,     │
//!   ├─────────┼────────┤               │        │        next }           │
//!   │ "img_a" │ id_1   │ ───────────►  │ id_1   │ { a, None, Some(id_2) } │
//!   │ "img_b" │ id_2   │ ───────────►  │ id_2   │ { b, id_1, Some(id_3) } │
//!   │ "img_c" │ id_3   │ ───────────►  │ id_3   │ { c, id_2, None }       │
//!   └─────────┴────────┘               └────────┴─────────────────────────┘
//!
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//!           (MRU)                   (LRU)
//! ```
//!
//! Every key in the map corresponds to exactly one list node and vice versa;
//! `total_count`/`total_cost` are maintained incrementally alongside. This
//! bijection is the structure's central invariant and `check_invariants()`
//! verifies it in full.
//!
//! ## Operations
//!
//! | Operation           | Effect                                       | Complexity |
//! |---------------------|----------------------------------------------|------------|
//! | `insert_at_head`    | New entry at MRU position                    | O(1)       |
//! | `upsert`            | Insert, or replace value/cost and touch      | O(1)       |
//! | `touch`             | Refresh timestamp, move to MRU, return value | O(1)       |
//! | `peek`              | Read value without recency mutation          | O(1)       |
//! | `remove`            | Unlink by key                                | O(1)       |
//! | `pop_tail`          | Remove the LRU entry                         | O(1)       |
//! | `tail_accessed_at`  | LRU entry's timestamp, for age trims         | O(1)       |
//! | `clear`             | Swap out the whole structure as a holder     | O(1)       |
//!
//! ## Thread Safety
//!
//! **Not thread-safe.** All synchronization is provided by the enclosing
//! cache engine, which guards this structure with a single mutex.

use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::InvariantError;

/// A cache entry: key, shared value, caller-supplied cost, and the moment of
/// last insertion-or-access.
///
/// Handed out whole on removal and eviction so the value's final drop can
/// happen wherever the caller chooses.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    value: Arc<V>,
    cost: u64,
    accessed_at: Instant,
}

impl<K, V> CacheEntry<K, V> {
    /// The entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The entry's value.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// The caller-supplied cost.
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// The moment this entry was last inserted or accessed.
    pub fn accessed_at(&self) -> Instant {
        self.accessed_at
    }

    /// Consumes the entry, returning its key and value.
    pub fn into_parts(self) -> (K, Arc<V>) {
        (self.key, self.value)
    }
}

#[derive(Debug)]
struct Node<K, V> {
    entry: CacheEntry<K, V>,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

#[derive(Debug)]
/// Recency-ordered list plus keyed index with incremental count/cost sums.
pub struct RecencyIndex<K, V> {
    map: FxHashMap<K, SlotId>,
    arena: SlotArena<Node<K, V>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    total_cost: u64,
}

impl<K, V> RecencyIndex<K, V> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries present.
    pub fn total_count(&self) -> usize {
        self.map.len()
    }

    /// Returns the sum of the costs of all entries present.
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Returns `true` if no entries are present.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the timestamp of the least-recently-used entry, if any.
    pub fn tail_accessed_at(&self) -> Option<Instant> {
        self.tail
            .and_then(|id| self.arena.get(id))
            .map(|node| node.entry.accessed_at)
    }

    /// Empties the structure in O(1) by swapping it with a fresh one.
    ///
    /// The populated structure is returned to the caller as an opaque holder;
    /// dropping it performs the actual entry destruction, so the caller
    /// decides when and on which thread that cost is paid.
    pub fn clear(&mut self) -> Self {
        mem::take(self)
    }
}

impl<K, V> RecencyIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Returns `true` if `key` is present. Does not mutate recency order.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts a new entry at the head (MRU position).
    ///
    /// The key must not already be present; use [`upsert`](Self::upsert) for
    /// insert-or-replace semantics.
    pub fn insert_at_head(&mut self, key: K, value: Arc<V>, cost: u64, now: Instant) {
        debug_assert!(
            !self.map.contains_key(&key),
            "insert_at_head requires an absent key"
        );
        let node = Node {
            entry: CacheEntry {
                key: key.clone(),
                value,
                cost,
                accessed_at: now,
            },
            prev: None,
            next: self.head,
        };
        let id = self.arena.insert(node);
        if let Some(head) = self.head {
            if let Some(head_node) = self.arena.get_mut(head) {
                head_node.prev = Some(id);
            }
        } else {
            self.tail = Some(id);
        }
        self.head = Some(id);
        self.map.insert(key, id);
        self.total_cost += cost;
    }

    /// Inserts at the head, or replaces the value and cost of an existing
    /// entry, refreshing its timestamp and bringing it to the head.
    ///
    /// Returns the previous value when the key was already present; the cost
    /// sum is adjusted by the delta between old and new cost.
    pub fn upsert(&mut self, key: K, value: Arc<V>, cost: u64, now: Instant) -> Option<Arc<V>> {
        let id = match self.map.get(&key) {
            Some(&id) => id,
            None => {
                self.insert_at_head(key, value, cost, now);
                return None;
            }
        };
        let old = {
            let node = self.arena.get_mut(id)?;
            let old_cost = node.entry.cost;
            node.entry.cost = cost;
            node.entry.accessed_at = now;
            self.total_cost = self.total_cost - old_cost + cost;
            mem::replace(&mut node.entry.value, value)
        };
        self.bring_to_head(id);
        Some(old)
    }

    /// Refreshes the entry's timestamp, brings it to the head, and returns a
    /// clone of its value. This is the mutating read behind the engine's
    /// `get`.
    pub fn touch(&mut self, key: &K, now: Instant) -> Option<Arc<V>> {
        let id = *self.map.get(key)?;
        let value = {
            let node = self.arena.get_mut(id)?;
            node.entry.accessed_at = now;
            Arc::clone(&node.entry.value)
        };
        self.bring_to_head(id);
        Some(value)
    }

    /// Returns a clone of the entry's value without mutating recency order.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        let id = *self.map.get(key)?;
        self.arena
            .get(id)
            .map(|node| Arc::clone(&node.entry.value))
    }

    /// Unlinks and returns the entry for `key`, if present.
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<K, V>> {
        let id = self.map.remove(key)?;
        self.detach(id)?;
        let node = self.arena.remove(id)?;
        self.total_cost -= node.entry.cost;
        Some(node.entry)
    }

    /// Removes and returns the least-recently-used entry, or `None` if empty.
    pub fn pop_tail(&mut self) -> Option<CacheEntry<K, V>> {
        let id = self.tail?;
        self.detach(id)?;
        let node = self.arena.remove(id)?;
        self.map.remove(&node.entry.key);
        self.total_cost -= node.entry.cost;
        Some(node.entry)
    }

    fn bring_to_head(&mut self, id: SlotId) {
        if Some(id) == self.head {
            return;
        }
        self.detach(id);
        self.attach_front(id);
    }

    fn detach(&mut self, id: SlotId) -> Option<()> {
        let (prev, next) = {
            let node = self.arena.get(id)?;
            (node.prev, node.next)
        };

        if let Some(prev_id) = prev {
            if let Some(prev_node) = self.arena.get_mut(prev_id) {
                prev_node.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_id) = next {
            if let Some(next_node) = self.arena.get_mut(next_id) {
                next_node.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        if let Some(node) = self.arena.get_mut(id) {
            node.prev = None;
            node.next = None;
        }

        Some(())
    }

    fn attach_front(&mut self, id: SlotId) -> Option<()> {
        let old_head = self.head;
        if let Some(node) = self.arena.get_mut(id) {
            node.prev = None;
            node.next = old_head;
        } else {
            return None;
        }
        if let Some(old_head) = old_head {
            if let Some(head_node) = self.arena.get_mut(old_head) {
                head_node.prev = Some(id);
            }
        } else {
            self.tail = Some(id);
        }
        self.head = Some(id);
        Some(())
    }
}

impl<K, V> RecencyIndex<K, V>
where
    K: Eq + Hash,
{
    /// Validates the full structural invariant set: index ↔ list bijection,
    /// link well-formedness, and aggregate sums.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.arena.check_invariants()?;

        if self.map.len() != self.arena.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys but arena holds {} nodes",
                self.map.len(),
                self.arena.len()
            )));
        }

        if self.head.is_none() || self.tail.is_none() {
            if self.head.is_some() || self.tail.is_some() {
                return Err(InvariantError::new("head and tail disagree on emptiness"));
            }
            if !self.map.is_empty() {
                return Err(InvariantError::new("empty list but populated index"));
            }
            if self.total_cost != 0 {
                return Err(InvariantError::new("empty list with non-zero total cost"));
            }
            return Ok(());
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut cost_sum = 0u64;
        let mut prev = None;
        let mut current = self.head;

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(InvariantError::new("cycle detected in recency list"));
            }
            let node = self
                .arena
                .get(id)
                .ok_or_else(|| InvariantError::new("list references a freed slot"))?;
            if node.prev != prev {
                return Err(InvariantError::new("prev link does not match list order"));
            }
            match self.map.get(&node.entry.key) {
                Some(&mapped) if mapped == id => {}
                _ => {
                    return Err(InvariantError::new(
                        "node key does not map back to its slot",
                    ))
                }
            }
            cost_sum += node.entry.cost;
            count += 1;
            prev = Some(id);
            current = node.next;
        }

        if prev != self.tail {
            return Err(InvariantError::new("tail does not terminate the list"));
        }
        if count != self.map.len() {
            return Err(InvariantError::new(format!(
                "list holds {} nodes but index holds {} keys",
                count,
                self.map.len()
            )));
        }
        if cost_sum != self.total_cost {
            return Err(InvariantError::new(format!(
                "cost sum {} does not match tracked total {}",
                cost_sum, self.total_cost
            )));
        }
        Ok(())
    }
}

impl<K, V> Default for RecencyIndex<K, V> {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            arena: SlotArena::new(),
            head: None,
            tail: None,
            total_cost: 0,
        }
    }
}
