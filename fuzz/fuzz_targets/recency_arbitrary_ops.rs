#![no_main]

use std::sync::Arc;
use std::time::{Duration, Instant};

use libfuzzer_sys::fuzz_target;
use memkit::ds::RecencyIndex;

// Fuzz arbitrary operation sequences on RecencyIndex
//
// Tests random sequences of upsert, touch, peek, remove, pop_tail, clear
// operations, validating the index/list bijection, link well-formedness,
// and aggregate sums after every step.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let base = Instant::now();
    let mut index: RecencyIndex<u8, u32> = RecencyIndex::new();
    let mut shadow_count = 0usize;

    let mut idx = 0;
    let mut tick = 0u64;
    while idx + 1 < data.len() {
        let op = data[idx] % 7;
        let key = data[idx + 1] % 32;
        // Strictly increasing timestamps keep recency and age order aligned.
        tick += 1;
        let now = base + Duration::from_micros(tick);

        match op {
            0 => {
                // upsert
                let cost = u64::from(key) % 8;
                let was_present = index.contains(&key);
                let old = index.upsert(key, Arc::new(u32::from(key)), cost, now);
                assert_eq!(old.is_some(), was_present);
                if !was_present {
                    shadow_count += 1;
                }
                assert!(index.contains(&key));
            }
            1 => {
                // touch
                let was_present = index.contains(&key);
                let touched = index.touch(&key, now);
                assert_eq!(touched.is_some(), was_present);
            }
            2 => {
                // peek
                let was_present = index.contains(&key);
                assert_eq!(index.peek(&key).is_some(), was_present);
            }
            3 => {
                // remove
                if index.remove(&key).is_some() {
                    shadow_count -= 1;
                }
                assert!(!index.contains(&key));
                assert!(index.remove(&key).is_none());
            }
            4 => {
                // pop_tail
                let oldest = index.tail_accessed_at();
                if let Some(entry) = index.pop_tail() {
                    shadow_count -= 1;
                    assert_eq!(Some(entry.accessed_at()), oldest);
                    assert!(!index.contains(entry.key()));
                } else {
                    assert!(index.is_empty());
                }
            }
            5 => {
                // tail timestamp never exceeds "now"
                if let Some(accessed_at) = index.tail_accessed_at() {
                    assert!(accessed_at <= now);
                }
            }
            6 => {
                // clear hands back everything
                let holder = index.clear();
                assert_eq!(holder.total_count(), shadow_count);
                holder.check_invariants().unwrap();
                shadow_count = 0;
                assert!(index.is_empty());
                assert_eq!(index.total_cost(), 0);
            }
            _ => unreachable!(),
        }

        assert_eq!(index.total_count(), shadow_count);
        index.check_invariants().unwrap();
        idx += 2;
    }
});
