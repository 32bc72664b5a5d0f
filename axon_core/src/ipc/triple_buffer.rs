//! Lock-based triple buffer exchange.
//!
//! Three slots rotate through the roles back (producer-owned, written in
//! place), middle (the handoff, guarded by the segment-resident mutex) and
//! front (consumer-owned, read until the next fetch). A commit swaps back
//! with middle and raises the fresh flag; a fetch swaps middle with front
//! when the flag is up. The producer never waits for the consumer: its worst
//! case is the microsecond-scale mutex hold of a concurrent fetch.
//!
//! Only the most recent commit survives a slow consumer. Intermediate
//! frames are dropped by design; the system favors freshness over
//! completeness.

use crate::ipc::futex::{RawCondvar, RawMutex};
use crate::memory::ShmSafe;
use bytemuck::Pod;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Control header for one exchange. Cache-line aligned so the slots start
/// on their own line.
#[repr(C, align(64))]
struct ExchangeHeader {
    mutex: RawMutex,
    condvar: RawCondvar,
    /// Slot currently written by the producer. Only the producer's commit
    /// moves it, so the producer may read it without the lock.
    back: AtomicU8,
    /// The handoff slot. Touched only under the mutex.
    middle: AtomicU8,
    /// Slot currently read by the consumer. Only the consumer's fetch moves
    /// it, so the consumer may read it without the lock.
    front: AtomicU8,
    /// Nonzero iff the middle slot holds a frame the consumer has not seen.
    fresh: AtomicU8,
    _padding: [u8; 52],
}

/// Triple-buffered single-producer single-consumer exchange for one `T`.
///
/// Lives directly inside a shared segment (or on the heap for in-process
/// use between two threads). Producer and consumer roles are a convention
/// of which operations each side calls, not separate handle types: the
/// producer side uses [`write`](Self::write)/[`commit`](Self::commit), the
/// consumer side the fetch family and [`front`](Self::front).
///
/// The role indices are always a permutation of {0, 1, 2}. No operation
/// here fails with an error value; a timed fetch that returns `false` is a
/// missed deadline, counted by the caller.
#[repr(C)]
pub struct TripleBuffer<T> {
    header: ExchangeHeader,
    slots: [UnsafeCell<T>; 3],
}

// One producer and one consumer may use the buffer from different threads
// or processes; slot access is serialized by the role protocol.
unsafe impl<T: Send> Send for TripleBuffer<T> {}
unsafe impl<T: Send> Sync for TripleBuffer<T> {}

unsafe impl<T: Pod + Send + Sync> ShmSafe for TripleBuffer<T> {
    fn init_in_place(&self) {
        self.header.back.store(0, Ordering::Relaxed);
        self.header.middle.store(1, Ordering::Relaxed);
        self.header.front.store(2, Ordering::Relaxed);
        self.header.fresh.store(0, Ordering::Relaxed);
    }
}

impl<T: Pod> TripleBuffer<T> {
    /// In-process constructor. Segment-resident buffers are built by
    /// `SharedRegion::create` instead, which zero-fills and then runs
    /// [`ShmSafe::init_in_place`].
    pub fn new() -> Self {
        Self {
            header: ExchangeHeader {
                mutex: RawMutex::new(),
                condvar: RawCondvar::new(),
                back: AtomicU8::new(0),
                middle: AtomicU8::new(1),
                front: AtomicU8::new(2),
                fresh: AtomicU8::new(0),
                _padding: [0; 52],
            },
            slots: [
                UnsafeCell::new(T::zeroed()),
                UnsafeCell::new(T::zeroed()),
                UnsafeCell::new(T::zeroed()),
            ],
        }
    }

    /// Copy `frame` into the back slot. Does not publish; call
    /// [`commit`](Self::commit) when the frame is complete.
    #[inline(always)]
    pub fn write(&self, frame: T) {
        let idx = self.header.back.load(Ordering::Relaxed) as usize;
        unsafe { *self.slots[idx].get() = frame };
    }

    /// Mutable access to the back slot for in-place frame construction.
    ///
    /// # Safety
    ///
    /// The caller must be the unique producer, and the reference must not
    /// outlive the next [`commit`](Self::commit): the commit rebinds the
    /// back role to another slot.
    #[inline(always)]
    pub unsafe fn back_mut(&self) -> &mut T {
        let idx = self.header.back.load(Ordering::Relaxed) as usize;
        &mut *self.slots[idx].get()
    }

    /// Publish the back slot: swap back with middle and raise the fresh
    /// flag. Never waits for the consumer; drops the previous middle frame
    /// if it was never fetched (last-value-wins).
    pub fn commit(&self) {
        let h = &self.header;
        let old_back = h.back.load(Ordering::Relaxed);
        h.mutex.lock();
        let middle = h.middle.load(Ordering::Relaxed);
        h.back.store(middle, Ordering::Relaxed);
        h.middle.store(old_back, Ordering::Relaxed);
        h.fresh.store(1, Ordering::Relaxed);
        h.mutex.unlock();
        // Notify after unlocking so the woken consumer finds the mutex free.
        h.condvar.notify_one();
    }

    /// Adopt the middle frame if it is fresh: swap middle with front and
    /// clear the flag. Returns whether a new frame is now at the front.
    /// Without fresh data nothing moves, so stale frames are never
    /// re-presented as new.
    pub fn try_fetch(&self) -> bool {
        let h = &self.header;
        h.mutex.lock();
        let fetched = self.take_middle_locked();
        h.mutex.unlock();
        fetched
    }

    /// As [`try_fetch`](Self::try_fetch), but waits up to `timeout` for a
    /// commit. A `false` return is a missed deadline: no swap happened and
    /// the front view is untouched.
    pub fn fetch_timeout(&self, timeout: Duration) -> bool {
        let h = &self.header;
        let deadline = Instant::now() + timeout;
        h.mutex.lock();
        while h.fresh.load(Ordering::Relaxed) == 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            h.condvar.wait_timeout(&h.mutex, deadline - now);
        }
        let fetched = self.take_middle_locked();
        h.mutex.unlock();
        fetched
    }

    /// Wait indefinitely for fresh data, then adopt it. For consumers with
    /// nothing else to do and no tolerance for staleness.
    pub fn fetch_blocking(&self) {
        let h = &self.header;
        h.mutex.lock();
        while h.fresh.load(Ordering::Relaxed) == 0 {
            h.condvar.wait(&h.mutex);
        }
        self.take_middle_locked();
        h.mutex.unlock();
    }

    /// The consumer's view of the last fetched frame. Stable until the next
    /// successful fetch; before the first one it reads the zeroed slot.
    #[inline(always)]
    pub fn front(&self) -> &T {
        let idx = self.header.front.load(Ordering::Relaxed) as usize;
        unsafe { &*self.slots[idx].get() }
    }

    /// Whether an unfetched frame is waiting in the middle slot.
    pub fn has_fresh(&self) -> bool {
        self.header.fresh.load(Ordering::Relaxed) != 0
    }

    fn take_middle_locked(&self) -> bool {
        let h = &self.header;
        if h.fresh.load(Ordering::Relaxed) == 0 {
            return false;
        }
        let old_front = h.front.load(Ordering::Relaxed);
        let middle = h.middle.load(Ordering::Relaxed);
        h.front.store(middle, Ordering::Relaxed);
        h.middle.store(old_front, Ordering::Relaxed);
        h.fresh.store(0, Ordering::Relaxed);
        true
    }

    #[cfg(test)]
    fn roles(&self) -> (u8, u8, u8) {
        let h = &self.header;
        (
            h.back.load(Ordering::Relaxed),
            h.middle.load(Ordering::Relaxed),
            h.front.load(Ordering::Relaxed),
        )
    }
}

impl<T: Pod> Default for TripleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn assert_permutation(buffer: &TripleBuffer<u64>) {
        let (back, middle, front) = buffer.roles();
        let mut seen = [false; 3];
        for idx in [back, middle, front] {
            assert!(idx < 3);
            seen[idx as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_initial_roles() {
        let buffer = TripleBuffer::<u64>::new();
        assert_eq!(buffer.roles(), (0, 1, 2));
        assert!(!buffer.has_fresh());
        assert_eq!(*buffer.front(), 0);
    }

    #[test]
    fn test_write_commit_fetch_cycle() {
        let buffer = TripleBuffer::<u64>::new();

        buffer.write(7);
        buffer.commit();
        assert!(buffer.has_fresh());
        assert_permutation(&buffer);

        assert!(buffer.try_fetch());
        assert_eq!(*buffer.front(), 7);
        assert!(!buffer.has_fresh());
        assert_permutation(&buffer);

        // Nothing new: no swap, front unchanged.
        assert!(!buffer.try_fetch());
        assert_eq!(*buffer.front(), 7);
    }

    #[test]
    fn test_last_value_wins() {
        let buffer = TripleBuffer::<u64>::new();
        for value in 1..=100u64 {
            buffer.write(value);
            buffer.commit();
        }
        assert!(buffer.try_fetch());
        assert_eq!(*buffer.front(), 100);
        assert!(!buffer.try_fetch());
    }

    #[test]
    fn test_fetch_timeout_misses_without_commit() {
        let buffer = TripleBuffer::<u64>::new();
        let start = Instant::now();
        let fetched = buffer.fetch_timeout(Duration::from_millis(50));
        let elapsed = start.elapsed();

        assert!(!fetched);
        assert!(elapsed >= Duration::from_millis(45));
        assert_eq!(*buffer.front(), 0);
        assert_eq!(buffer.roles(), (0, 1, 2));
    }

    #[test]
    fn test_fetch_timeout_wakes_on_commit() {
        let buffer = Arc::new(TripleBuffer::<u64>::new());

        let consumer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                let fetched = buffer.fetch_timeout(Duration::from_secs(5));
                (fetched, *buffer.front())
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        buffer.write(99);
        buffer.commit();

        let (fetched, value) = consumer.join().unwrap();
        assert!(fetched);
        assert_eq!(value, 99);
    }

    #[test]
    fn test_fetch_blocking_returns_already_committed() {
        let buffer = TripleBuffer::<u64>::new();
        buffer.write(11);
        buffer.commit();
        buffer.fetch_blocking();
        assert_eq!(*buffer.front(), 11);
    }

    #[test]
    fn test_in_place_write() {
        let buffer = TripleBuffer::<[u64; 4]>::new();
        unsafe {
            let back = buffer.back_mut();
            back[0] = 1;
            back[3] = 4;
        }
        buffer.commit();
        assert!(buffer.try_fetch());
        assert_eq!(*buffer.front(), [1, 0, 0, 4]);
    }
}
