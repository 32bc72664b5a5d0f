//! Mutex-guarded single-value cell for low-rate ancillary state.
//!
//! Monitoring and configuration blocks do not need triple buffering: a
//! plain guarded slot with copy-in/copy-out semantics is enough at a few
//! hertz, and any number of processes may read it. Writers that cannot
//! afford to wait use [`try_write`](SharedCell::try_write) and simply skip
//! the update when the cell is busy.

use crate::ipc::futex::RawMutex;
use crate::memory::ShmSafe;
use bytemuck::Pod;
use std::cell::UnsafeCell;

/// One `T` behind a process-shared mutex, valid in a shared segment.
///
/// All access copies: the lock is released before the caller ever sees the
/// value, so no reference into the cell outlives the critical section.
#[repr(C, align(64))]
pub struct SharedCell<T> {
    mutex: RawMutex,
    _padding: [u8; 60],
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SharedCell<T> {}
unsafe impl<T: Send> Sync for SharedCell<T> {}

// Zero state: unlocked mutex, zeroed value. Nothing to set up.
unsafe impl<T: Pod + Send + Sync> ShmSafe for SharedCell<T> {}

impl<T: Pod> SharedCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            mutex: RawMutex::new(),
            _padding: [0; 60],
            value: UnsafeCell::new(value),
        }
    }

    /// Copy `value` into the cell, waiting for the lock if necessary.
    pub fn write(&self, value: &T) {
        self.mutex.lock();
        unsafe { *self.value.get() = *value };
        self.mutex.unlock();
    }

    /// Copy `value` into the cell unless it is locked right now.
    /// Returns whether the update happened; a skipped monitor update is
    /// dropped, the next one carries fresher data anyway.
    pub fn try_write(&self, value: &T) -> bool {
        if !self.mutex.try_lock() {
            return false;
        }
        unsafe { *self.value.get() = *value };
        self.mutex.unlock();
        true
    }

    /// Copy the current value out, waiting for the lock if necessary.
    pub fn read(&self) -> T {
        self.mutex.lock();
        let value = unsafe { *self.value.get() };
        self.mutex.unlock();
        value
    }
}

impl<T: Pod> Default for SharedCell<T> {
    fn default() -> Self {
        Self::new(T::zeroed())
    }
}
