// Simultaneous transfer limits per user

use crate::core_transfer::state::Direction;
use crate::users::UserId;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct UserCounters {
    downloads: AtomicUsize,
    uploads: AtomicUsize,
}

impl UserCounters {
    fn slot(&self, direction: Direction) -> &AtomicUsize {
        match direction {
            Direction::Download => &self.downloads,
            Direction::Upload => &self.uploads,
        }
    }
}

/// Process-wide registry of active downloads/uploads per user.
///
/// Each user's counters are atomics; the map lock is only taken to look up or insert a user's
/// entry, never while a count changes.
#[derive(Debug, Default)]
pub struct TransferCounter {
    users: RwLock<HashMap<UserId, Arc<UserCounters>>>,
}

impl TransferCounter {
    /// Creates the registry at process start.
    pub fn init() -> Arc<Self> {
        info!("Transfer counter initialised");
        Arc::new(Self::default())
    }

    /// Drops every entry at process stop. Nothing survives a restart.
    pub fn teardown(&self) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let active: usize = users
            .values()
            .map(|c| c.downloads.load(Ordering::SeqCst) + c.uploads.load(Ordering::SeqCst))
            .sum();
        if active > 0 {
            warn!("Transfer counter torn down with {} active transfer(s)", active);
        }
        users.clear();
        info!("Transfer counter torn down");
    }

    fn counters(&self, uid: UserId) -> Arc<UserCounters> {
        if let Some(counters) = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&uid)
        {
            return Arc::clone(counters);
        }
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(users.entry(uid).or_default())
    }

    /// Takes a slot when fewer than `max_allowed` are active. `max_allowed <= 0` is unlimited.
    pub fn try_acquire(&self, uid: UserId, direction: Direction, max_allowed: i32) -> bool {
        let counters = self.counters(uid);
        let slot = counters.slot(direction);

        if max_allowed <= 0 {
            slot.fetch_add(1, Ordering::SeqCst);
            return true;
        }

        let limit = max_allowed as usize;
        let granted = slot
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < limit).then_some(active + 1)
            })
            .is_ok();
        debug!(
            "{} slot for uid {}: {}",
            direction.as_str(),
            uid,
            if granted { "granted" } else { "refused" }
        );
        granted
    }

    /// Gives a slot back. Never drops below zero.
    pub fn release(&self, uid: UserId, direction: Direction) {
        let counters = self.counters(uid);
        let released = counters
            .slot(direction)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                active.checked_sub(1)
            })
            .is_ok();
        if !released {
            warn!(
                "Release of a {} slot for uid {} that was never acquired",
                direction.as_str(),
                uid
            );
        }
    }

    #[cfg(test)]
    pub fn active(&self, uid: UserId, direction: Direction) -> usize {
        self.counters(uid).slot(direction).load(Ordering::SeqCst)
    }

    /// Like [`try_acquire`](Self::try_acquire) but returns a guard that releases the slot when
    /// dropped, whatever path the transfer leaves by.
    pub fn acquire_slot(
        self: &Arc<Self>,
        uid: UserId,
        direction: Direction,
        max_allowed: i32,
    ) -> Option<TransferSlot> {
        self.try_acquire(uid, direction, max_allowed)
            .then(|| TransferSlot {
                counter: Arc::clone(self),
                uid,
                direction,
            })
    }
}

/// A held transfer slot. Released exactly once, on drop.
#[derive(Debug)]
pub struct TransferSlot {
    counter: Arc<TransferCounter>,
    uid: UserId,
    direction: Direction,
}

impl Drop for TransferSlot {
    fn drop(&mut self) {
        self.counter.release(self.uid, self.direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_limit_is_enforced_per_direction() {
        let counter = TransferCounter::init();
        assert!(counter.try_acquire(1, Direction::Download, 2));
        assert!(counter.try_acquire(1, Direction::Download, 2));
        assert!(!counter.try_acquire(1, Direction::Download, 2));
        // uploads and other users are counted separately
        assert!(counter.try_acquire(1, Direction::Upload, 1));
        assert!(counter.try_acquire(2, Direction::Download, 1));

        counter.release(1, Direction::Download);
        assert!(counter.try_acquire(1, Direction::Download, 2));
    }

    #[test]
    fn test_non_positive_limit_is_unlimited() {
        let counter = TransferCounter::init();
        for _ in 0..100 {
            assert!(counter.try_acquire(7, Direction::Upload, 0));
        }
        assert!(counter.try_acquire(7, Direction::Upload, -1));
        assert_eq!(counter.active(7, Direction::Upload), 101);
    }

    #[test]
    fn test_concurrent_acquisition_never_exceeds_limit() {
        const LIMIT: usize = 4;
        let counter = TransferCounter::init();
        let barrier = Arc::new(Barrier::new(LIMIT + 1));

        let handles: Vec<_> = (0..=LIMIT)
            .map(|_| {
                let counter = Arc::clone(&counter);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    counter.try_acquire(42, Direction::Download, LIMIT as i32)
                })
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, LIMIT);
        assert_eq!(counter.active(42, Direction::Download), LIMIT);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let counter = TransferCounter::init();
        {
            let slot = counter.acquire_slot(3, Direction::Download, 1).unwrap();
            assert_eq!(slot.direction, Direction::Download);
            assert!(counter.acquire_slot(3, Direction::Download, 1).is_none());
        }
        assert_eq!(counter.active(3, Direction::Download), 0);
        assert!(counter.acquire_slot(3, Direction::Download, 1).is_some());
    }

    #[test]
    fn test_refused_guard_does_not_disturb_other_slots() {
        let counter = TransferCounter::init();
        let held = counter.acquire_slot(5, Direction::Upload, 1).unwrap();
        let refused = counter.acquire_slot(5, Direction::Upload, 1);
        assert!(refused.is_none());
        drop(refused);
        assert_eq!(counter.active(5, Direction::Upload), 1);
        drop(held);
        assert_eq!(counter.active(5, Direction::Upload), 0);
    }

    #[test]
    fn test_release_without_acquire_saturates() {
        let counter = TransferCounter::init();
        counter.release(9, Direction::Download);
        assert_eq!(counter.active(9, Direction::Download), 0);
        assert!(counter.try_acquire(9, Direction::Download, 1));
        assert!(!counter.try_acquire(9, Direction::Download, 1));
    }

    #[test]
    fn test_teardown_clears_entries() {
        let counter = TransferCounter::init();
        assert!(counter.try_acquire(1, Direction::Download, 1));
        counter.teardown();
        assert_eq!(counter.active(1, Direction::Download), 0);
    }
}
