//! Striped per-key write locks
//!
//! Writes to the same id serialize on one of a fixed number of mutexes,
//! picked by hashing the id's key bytes. This makes `insert`'s
//! check-then-write atomic within a store instance without a lock per id.
//! Reads never take these locks.

use std::hash::Hasher;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHasher;

/// Number of lock stripes
pub const LOCK_STRIPES: usize = 64;

/// Fixed array of mutex stripes
#[derive(Debug)]
pub struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
}

impl KeyLocks {
    /// `LOCK_STRIPES` unlocked stripes
    pub fn new() -> Self {
        Self {
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Stripe index for a key
    pub fn stripe_of(&self, key: &[u8]) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        (hasher.finish() as usize) % self.stripes.len()
    }

    /// Lock the stripe covering `key`
    pub fn lock(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock()
    }

    /// Lock every stripe, in stripe order
    ///
    /// Used by index rebuild to exclude all writers.
    pub fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.stripes.iter().map(|m| m.lock()).collect()
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stripe_is_stable() {
        let locks = KeyLocks::new();
        let a = locks.stripe_of(b"1001");
        assert_eq!(a, locks.stripe_of(b"1001"));
        assert!(a < LOCK_STRIPES);
    }

    #[test]
    fn test_lock_all_holds_every_stripe() {
        let locks = KeyLocks::new();
        let guards = locks.lock_all();
        assert_eq!(guards.len(), LOCK_STRIPES);
        assert!(locks.stripes.iter().all(|m| m.is_locked()));
        drop(guards);
        assert!(locks.stripes.iter().all(|m| !m.is_locked()));
    }

    #[test]
    fn test_same_key_serializes() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = locks.lock(b"same");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
