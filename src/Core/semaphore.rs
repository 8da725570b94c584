use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use super::futex::{futex_wait, futex_wake};

/// Counting semaphore parked on a futex word.
///
/// The word is the permit count itself: waiters sleep while it reads zero,
/// `release` bumps it and wakes one sleeper.
pub struct Semaphore {
    permits: AtomicU32,
}

impl Semaphore {
    pub const fn new(initial: u32) -> Self {
        Self {
            permits: AtomicU32::new(initial),
        }
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.permits
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |p| p.checked_sub(1))
            .is_ok()
    }

    /// Block until a permit is available.
    pub fn acquire(&self) {
        while !self.try_acquire() {
            futex_wait(&self.permits, 0, None);
        }
    }

    /// Block for at most `timeout`. Returns `false` if the deadline passed
    /// without a permit.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            futex_wait(&self.permits, 0, Some(deadline - now));
        }
    }

    pub fn release(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        futex_wake(&self.permits, 1);
    }

    /// Event-style release: leaves at most one permit pending.
    ///
    /// For waiters that re-check their own condition after waking, where
    /// piling up permits would only cause empty wakeups.
    pub fn notify(&self) {
        let _ = self
            .permits
            .fetch_update(Ordering::Release, Ordering::Relaxed, |p| {
                if p == 0 {
                    Some(1)
                } else {
                    None
                }
            });
        futex_wake(&self.permits, 1);
    }

    /// Current permit count (racy, for diagnostics).
    pub fn available(&self) -> u32 {
        self.permits.load(Ordering::Relaxed)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("permits", &self.available())
            .finish()
    }
}
