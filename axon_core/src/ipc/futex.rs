//! Process-shared locking primitives.
//!
//! `std::sync::Mutex` is process-local, so the lock-based exchange protocol
//! carries its own primitives inside the shared segment: one futex word per
//! mutex and one sequence word per condition variable. Both are valid at any
//! address in a mapped segment and start in their zero state.
//!
//! On Linux the words park and wake through `SYS_futex` (without
//! `FUTEX_PRIVATE_FLAG`, since the waiters live in other processes). Other
//! platforms fall back to polling the word with short sleeps, which keeps
//! the semantics at the cost of wake-up latency.
//!
//! No priority-inheritance protocol is used. A preempted lock holder can
//! invert priorities; callers on hard real-time paths use the lock-free
//! exchange variant instead.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

const SPIN_LIMIT: u32 = 100;

/// Futex-based mutex word, valid in shared memory. Zero state = unlocked.
///
/// Deliberately minimal: no guard type, no poisoning. The exchange
/// structures wrap every lock/unlock pair themselves.
#[repr(C)]
pub struct RawMutex {
    state: AtomicU32,
}

impl RawMutex {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    #[inline]
    pub fn lock(&self) {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }
        self.lock_contended();
    }

    #[cold]
    fn lock_contended(&self) {
        let mut spin = 0;
        while spin < SPIN_LIMIT {
            if self
                .state
                .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
            spin += 1;
        }
        // Park until the holder releases. Marking the word contended makes
        // the next unlock issue a wake.
        loop {
            if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return;
            }
            futex_wait(&self.state, CONTENDED, None);
        }
    }

    /// Acquire without blocking. Returns false if the lock is held.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            futex_wake(&self.state, 1);
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Futex-based condition variable word, valid in shared memory.
///
/// Wakes may be spurious and notifications issued while no one waits are
/// not remembered; callers always re-check their predicate under the mutex.
#[repr(C)]
pub struct RawCondvar {
    seq: AtomicU32,
}

impl RawCondvar {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
        }
    }

    /// Wake one waiter. Call after releasing the associated mutex.
    pub fn notify_one(&self) {
        self.seq.fetch_add(1, Ordering::Release);
        futex_wake(&self.seq, 1);
    }

    /// Release `mutex`, wait for a notification, then reacquire.
    ///
    /// The sequence word is sampled before unlocking, so a notification
    /// issued between the unlock and the park is never lost: the park
    /// returns immediately when the word has moved on.
    pub fn wait(&self, mutex: &RawMutex) {
        let seq = self.seq.load(Ordering::Acquire);
        mutex.unlock();
        futex_wait(&self.seq, seq, None);
        mutex.lock();
    }

    /// As [`wait`](Self::wait), but gives up after `timeout`.
    /// Returns false only when the wait timed out.
    pub fn wait_timeout(&self, mutex: &RawMutex, timeout: Duration) -> bool {
        let seq = self.seq.load(Ordering::Acquire);
        mutex.unlock();
        let notified = futex_wait(&self.seq, seq, Some(timeout));
        mutex.lock();
        notified
    }
}

impl Default for RawCondvar {
    fn default() -> Self {
        Self::new()
    }
}

/// Park until `*word != expected`, a wake arrives, or the timeout elapses.
/// Returns false only on timeout.
#[cfg(target_os = "linux")]
fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> bool {
    let ts = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);

    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT,
            expected,
            ts_ptr,
            std::ptr::null::<u32>(),
            0u32,
        )
    };

    if rc == 0 {
        return true;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::ETIMEDOUT) => false,
        // EAGAIN: the word already moved on. EINTR: signal; callers
        // re-check their predicate either way.
        _ => true,
    }
}

#[cfg(target_os = "linux")]
fn futex_wake(word: &AtomicU32, count: u32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE,
            count,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

// Portable fallback: poll the word. Sleepers notice a change within the
// poll interval instead of being woken directly.
#[cfg(not(target_os = "linux"))]
fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> bool {
    use std::time::Instant;

    const POLL: Duration = Duration::from_micros(100);
    let deadline = timeout.map(|d| Instant::now() + d);
    loop {
        if word.load(Ordering::Acquire) != expected {
            return true;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        std::thread::sleep(POLL);
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wake(_word: &AtomicU32, _count: u32) {}
