//! Lock-free triple buffer exchange.
//!
//! Same slot/role model as the lock-based [`TripleBuffer`], but role
//! transfer is a single atomic exchange on one byte: the low two bits carry
//! the index of the contested middle slot, one bit above them flags fresh
//! data. No mutex is held anywhere, so no blocking syscall and no priority
//! inversion can occur on the exchange path. The price is coarse,
//! poll-based waiting instead of a condition-variable wake-up.
//!
//! [`TripleBuffer`]: crate::ipc::triple_buffer::TripleBuffer

use crate::memory::ShmSafe;
use bytemuck::Pod;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Decoded middle word: a slot index tagged with the fresh flag.
///
/// Bit layout: `0b0fii` with `ii` the slot index and `f` the new-data bit.
/// All encoding and decoding goes through these functions; the raw byte
/// never gets masked at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MiddleState(u8);

impl MiddleState {
    const INDEX_MASK: u8 = 0b11;
    const FRESH_BIT: u8 = 0b100;

    /// Middle word announcing a freshly committed slot.
    const fn fresh(index: u8) -> Self {
        Self(index | Self::FRESH_BIT)
    }

    /// Middle word handing back an already-seen slot.
    const fn taken(index: u8) -> Self {
        Self(index)
    }

    const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    const fn raw(self) -> u8 {
        self.0
    }

    const fn index(self) -> u8 {
        self.0 & Self::INDEX_MASK
    }

    const fn is_fresh(self) -> bool {
        self.0 & Self::FRESH_BIT != 0
    }
}

#[repr(C, align(64))]
struct SwapHeader {
    /// The contested word: middle slot index plus fresh flag. The only
    /// field both sides touch, always via atomic exchange.
    middle: AtomicU8,
    /// Producer-owned back slot index. Only `publish` moves it.
    back: AtomicU8,
    /// Consumer-owned front slot index. Only `refresh` moves it.
    front: AtomicU8,
    _padding: [u8; 61],
}

/// Triple-buffered SPSC exchange with a single atomic word of shared state.
///
/// Producer side: mutate the back slot, then [`publish`](Self::publish).
/// Consumer side: [`refresh`](Self::refresh) (or
/// [`wait_for_new_data`](Self::wait_for_new_data)), then read
/// [`front`](Self::front). Roles are a calling convention, exactly as in
/// the lock-based variant.
#[repr(C)]
pub struct LockFreeTripleBuffer<T> {
    header: SwapHeader,
    slots: [UnsafeCell<T>; 3],
}

// Slot access is serialized by the exchange protocol: each slot is owned by
// exactly one role at any instant.
unsafe impl<T: Send> Send for LockFreeTripleBuffer<T> {}
unsafe impl<T: Send> Sync for LockFreeTripleBuffer<T> {}

unsafe impl<T: Pod + Send + Sync> ShmSafe for LockFreeTripleBuffer<T> {
    fn init_in_place(&self) {
        self.header.back.store(0, Ordering::Relaxed);
        self.header
            .middle
            .store(MiddleState::taken(1).raw(), Ordering::Relaxed);
        self.header.front.store(2, Ordering::Relaxed);
    }
}

impl<T: Pod> LockFreeTripleBuffer<T> {
    /// In-process constructor; segment-resident buffers go through
    /// `SharedRegion::create` and [`ShmSafe::init_in_place`].
    pub fn new() -> Self {
        Self {
            header: SwapHeader {
                middle: AtomicU8::new(MiddleState::taken(1).raw()),
                back: AtomicU8::new(0),
                front: AtomicU8::new(2),
                _padding: [0; 61],
            },
            slots: [
                UnsafeCell::new(T::zeroed()),
                UnsafeCell::new(T::zeroed()),
                UnsafeCell::new(T::zeroed()),
            ],
        }
    }

    /// Copy `frame` into the back slot without publishing it.
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
    /// outlive the next [`publish`](Self::publish).
    #[inline(always)]
    pub unsafe fn back_mut(&self) -> &mut T {
        let idx = self.header.back.load(Ordering::Relaxed) as usize;
        &mut *self.slots[idx].get()
    }

    /// Publish the back slot: one atomic exchange of the middle word with
    /// the back index tagged fresh. The previously contested slot becomes
    /// the new back. Completes in a single hardware step; no spin, no
    /// retry.
    #[inline(always)]
    pub fn publish(&self) {
        let h = &self.header;
        let back = h.back.load(Ordering::Relaxed);
        let prev = h
            .middle
            .swap(MiddleState::fresh(back).raw(), Ordering::AcqRel);
        h.back
            .store(MiddleState::from_raw(prev).index(), Ordering::Relaxed);
    }

    /// Adopt the middle slot: one atomic exchange of the middle word with
    /// the front index (untagged). Returns whether the adopted slot carried
    /// fresh data.
    ///
    /// The exchange happens even when the middle is stale, so after a
    /// `false` return the front view may show an older frame until the next
    /// publish. Consumers read [`front`](Self::front) after a successful
    /// refresh; the lock-based variant is the one that leaves the front
    /// untouched on a miss.
    #[inline(always)]
    pub fn refresh(&self) -> bool {
        let h = &self.header;
        let front = h.front.load(Ordering::Relaxed);
        let prev = MiddleState::from_raw(
            h.middle.swap(MiddleState::taken(front).raw(), Ordering::AcqRel),
        );
        h.front.store(prev.index(), Ordering::Relaxed);
        prev.is_fresh()
    }

    /// Poll [`refresh`](Self::refresh) at `interval` cadence until fresh
    /// data arrives or `max_wait` elapses. Millisecond-granularity by
    /// design: target frame periods are tens of milliseconds, so a
    /// condition-variable wake-up buys nothing the poll does not.
    pub fn wait_for_new_data(&self, max_wait: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        let mut fresh = self.refresh();
        while !fresh && Instant::now() < deadline {
            std::thread::sleep(interval);
            fresh = self.refresh();
        }
        fresh
    }

    /// The consumer's view of the last adopted slot.
    #[inline(always)]
    pub fn front(&self) -> &T {
        let idx = self.header.front.load(Ordering::Relaxed) as usize;
        unsafe { &*self.slots[idx].get() }
    }
}

impl<T: Pod> Default for LockFreeTripleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
