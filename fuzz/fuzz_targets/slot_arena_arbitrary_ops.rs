#![no_main]

use libfuzzer_sys::fuzz_target;
use memkit::ds::SlotArena;

// Fuzz arbitrary operation sequences on SlotArena
//
// Tests random sequences of insert, remove, get, get_mut, contains, clear
// operations, validating free-list bookkeeping after every step.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut arena: SlotArena<u32> = SlotArena::new();
    let mut all_ids = Vec::new();

    let mut idx = 0;
    while idx + 1 < data.len() {
        let op = data[idx] % 6;
        let value = u32::from(data[idx + 1]);

        match op {
            0 => {
                // insert
                let id = arena.insert(value);
                all_ids.push(id);

                assert!(arena.contains(id));
                assert_eq!(arena.get(id), Some(&value));
            }
            1 => {
                // remove
                if !all_ids.is_empty() {
                    let id = all_ids[(value as usize) % all_ids.len()];
                    let old_len = arena.len();
                    if arena.remove(id).is_some() {
                        assert_eq!(arena.len(), old_len - 1);
                        assert!(!arena.contains(id));
                    }
                }
            }
            2 => {
                // get (read-only)
                if !all_ids.is_empty() {
                    let id = all_ids[(value as usize) % all_ids.len()];
                    let _ = arena.get(id);
                }
            }
            3 => {
                // get_mut
                if !all_ids.is_empty() {
                    let id = all_ids[(value as usize) % all_ids.len()];
                    if let Some(slot) = arena.get_mut(id) {
                        *slot = value;
                        assert_eq!(arena.get(id), Some(&value));
                    }
                }
            }
            4 => {
                // emptiness consistency
                if arena.is_empty() {
                    assert_eq!(arena.len(), 0);
                    assert_eq!(arena.iter().count(), 0);
                } else {
                    assert!(arena.len() > 0);
                }
            }
            5 => {
                // clear
                arena.clear();
                all_ids.clear();

                assert!(arena.is_empty());
                assert_eq!(arena.len(), 0);
            }
            _ => unreachable!(),
        }

        arena.check_invariants().unwrap();
        idx += 2;
    }
});
