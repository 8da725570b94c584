// Counter primitives every FIFO transition is built from.
//
// Two policies, picked at build time:
// - default: each cell is a hardware `AtomicU32` (SeqCst).
// - `mutex-counters`: each cell is a plain `u32` behind a parking_lot mutex.
//
// All arithmetic wraps; callers rely on it.

#[cfg(not(feature = "mutex-counters"))]
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};

#[cfg(feature = "mutex-counters")]
use parking_lot::Mutex;

/// One shared unsigned 32-bit counter.
pub struct Counter {
    #[cfg(not(feature = "mutex-counters"))]
    cell: AtomicU32,
    #[cfg(feature = "mutex-counters")]
    cell: Mutex<u32>,
}

#[cfg(not(feature = "mutex-counters"))]
impl Counter {
    pub const fn new(value: u32) -> Self {
        Self {
            cell: AtomicU32::new(value),
        }
    }

    #[inline]
    pub fn load(&self) -> u32 {
        self.cell.load(SeqCst)
    }

    /// Exchange: writes `value`, returns what was there before.
    #[inline]
    pub fn store(&self, value: u32) -> u32 {
        self.cell.swap(value, SeqCst)
    }

    /// Adds a signed delta, returns the pre-update value.
    #[inline]
    pub fn fetch_add(&self, delta: i32) -> u32 {
        if delta >= 0 {
            self.cell.fetch_add(delta as u32, SeqCst)
        } else {
            self.cell.fetch_sub(delta.unsigned_abs(), SeqCst)
        }
    }

    /// Unsigned add, returns the pre-update value.
    #[inline]
    pub fn add(&self, delta: u32) -> u32 {
        self.cell.fetch_add(delta, SeqCst)
    }

    /// Unsigned subtract, returns the pre-update value.
    #[inline]
    pub fn sub(&self, delta: u32) -> u32 {
        self.cell.fetch_sub(delta, SeqCst)
    }

    /// Adds `delta` and folds the result back under `limit` with a single
    /// subtraction. Returns the pre-update value.
    #[inline]
    pub fn fetch_add_wrapping(&self, delta: u32, limit: u32) -> u32 {
        debug_assert!(delta <= limit);
        let prev = self.cell.fetch_update(SeqCst, SeqCst, |cur| {
            Some(wrap_once(cur, delta, limit))
        });
        // fetch_update only fails when the closure returns None.
        match prev {
            Ok(v) | Err(v) => v,
        }
    }

    /// Increments unless already at `u32::MAX`. Returns the pre-update value.
    #[inline]
    pub fn saturating_inc(&self) -> u32 {
        let prev = self
            .cell
            .fetch_update(SeqCst, SeqCst, |cur| cur.checked_add(1));
        match prev {
            Ok(v) | Err(v) => v,
        }
    }

    /// Sum of two cells from a snapshot in which neither moved.
    ///
    /// Reloads both until two consecutive reads agree, so a writer racing
    /// between the two loads cannot produce a torn sum.
    pub fn load_sum(a: &Counter, b: &Counter) -> u32 {
        let mut first = (a.load(), b.load());
        loop {
            let second = (a.load(), b.load());
            if second == first {
                return first.0.wrapping_add(first.1);
            }
            first = second;
            std::hint::spin_loop();
        }
    }
}

#[cfg(feature = "mutex-counters")]
impl Counter {
    pub const fn new(value: u32) -> Self {
        Self {
            cell: parking_lot::const_mutex(value),
        }
    }

    #[inline]
    pub fn load(&self) -> u32 {
        *self.cell.lock()
    }

    #[inline]
    pub fn store(&self, value: u32) -> u32 {
        std::mem::replace(&mut *self.cell.lock(), value)
    }

    #[inline]
    pub fn fetch_add(&self, delta: i32) -> u32 {
        let mut cell = self.cell.lock();
        let prev = *cell;
        *cell = prev.wrapping_add_signed(delta);
        prev
    }

    #[inline]
    pub fn add(&self, delta: u32) -> u32 {
        let mut cell = self.cell.lock();
        let prev = *cell;
        *cell = prev.wrapping_add(delta);
        prev
    }

    #[inline]
    pub fn sub(&self, delta: u32) -> u32 {
        let mut cell = self.cell.lock();
        let prev = *cell;
        *cell = prev.wrapping_sub(delta);
        prev
    }

    #[inline]
    pub fn fetch_add_wrapping(&self, delta: u32, limit: u32) -> u32 {
        debug_assert!(delta <= limit);
        let mut cell = self.cell.lock();
        let prev = *cell;
        *cell = wrap_once(prev, delta, limit);
        prev
    }

    #[inline]
    pub fn saturating_inc(&self) -> u32 {
        let mut cell = self.cell.lock();
        let prev = *cell;
        *cell = prev.saturating_add(1);
        prev
    }

    /// Callers hold the FIFO lock here, so two plain reads are a snapshot.
    pub fn load_sum(a: &Counter, b: &Counter) -> u32 {
        a.load().wrapping_add(b.load())
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// `cur + delta`, minus `limit` once if it reaches `limit`. Also correct
/// when the plain sum would not fit in a u32.
#[inline]
fn wrap_once(cur: u32, delta: u32, limit: u32) -> u32 {
    let (value, carried) = cur.overflowing_add(delta);
    if carried || value >= limit {
        value.wrapping_sub(limit)
    } else {
        value
    }
}
