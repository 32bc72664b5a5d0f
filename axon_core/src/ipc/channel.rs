//! Named, typed, cross-process channels.
//!
//! A channel is the unit application code instantiates: one shared segment
//! holding one exchange structure, plus the process-local role, config and
//! counters of this end. The producer process creates the channel, the
//! consumer attaches to it by name.
//!
//! One producer, one consumer per channel. The roles are a convention of
//! which operations each process calls; nothing stops a misbehaving caller
//! at compile time, the segment layout simply assumes the discipline.

use crate::error::AxonResult;
use crate::ipc::config::ChannelConfig;
use crate::ipc::lock_free::LockFreeTripleBuffer;
use crate::ipc::triple_buffer::TripleBuffer;
use crate::memory::SharedRegion;
use bytemuck::Pod;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Branch prediction hint: this condition is unlikely
#[inline(always)]
fn unlikely(b: bool) -> bool {
    #[cold]
    #[inline(never)]
    fn cold_path() {}

    if b {
        cold_path();
    }
    b
}

/// Which end of the channel this process holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Producer,
    Consumer,
}

/// Per-process counters for one channel end. Misses are expected under
/// load; sustained growth is the signal to look at, not single events.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    commits: AtomicU64,
    fetches: AtomicU64,
    misses: AtomicU64,
}

impl ChannelMetrics {
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Cross-process channel over the lock-based [`TripleBuffer`].
pub struct Channel<T: Pod + Send + Sync> {
    region: SharedRegion<TripleBuffer<T>>,
    name: String,
    role: ChannelRole,
    config: ChannelConfig,
    metrics: ChannelMetrics,
}

impl<T: Pod + Send + Sync> Channel<T> {
    /// Create the channel, becoming its producer end.
    pub fn create(name: &str) -> AxonResult<Self> {
        Self::create_with(name, ChannelConfig::default())
    }

    pub fn create_with(name: &str, config: ChannelConfig) -> AxonResult<Self> {
        config.validate()?;
        let region = SharedRegion::create(name)?;
        let role = ChannelRole::Producer;
        log::info!("Channel '{}': created as {:?}", name, role);
        Ok(Self {
            region,
            name: name.to_string(),
            role,
            config,
            metrics: ChannelMetrics::default(),
        })
    }

    /// Attach to an existing channel, becoming its consumer end.
    /// Fails with `NotFound` when the producer has not created it yet.
    pub fn attach(name: &str) -> AxonResult<Self> {
        Self::attach_with(name, ChannelConfig::default())
    }

    pub fn attach_with(name: &str, config: ChannelConfig) -> AxonResult<Self> {
        config.validate()?;
        let region = SharedRegion::attach(name)?;
        let role = ChannelRole::Consumer;
        log::info!("Channel '{}': attached as {:?}", name, role);
        Ok(Self {
            region,
            name: name.to_string(),
            role,
            config,
            metrics: ChannelMetrics::default(),
        })
    }

    #[inline(always)]
    fn buffer(&self) -> &TripleBuffer<T> {
        self.region.get()
    }

    /// Copy `frame` into the back slot and publish it. Never blocks on the
    /// consumer.
    #[inline(always)]
    pub fn write(&self, frame: T) {
        self.buffer().write(frame);
        self.commit();
    }

    /// Mutable access to the back slot for in-place frame construction.
    /// Pair with [`commit`](Self::commit).
    ///
    /// # Safety
    ///
    /// Same contract as [`TripleBuffer::back_mut`]: unique producer, and
    /// the reference must not outlive the next commit.
    pub unsafe fn back_mut(&self) -> &mut T {
        self.buffer().back_mut()
    }

    /// Publish the back slot.
    pub fn commit(&self) {
        self.buffer().commit();
        self.metrics.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Adopt the latest frame if one is pending. Returns the new front
    /// view, valid until the next successful fetch.
    pub fn try_fetch(&self) -> Option<&T> {
        if self.buffer().try_fetch() {
            self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
            Some(self.buffer().front())
        } else {
            None
        }
    }

    /// Wait up to the configured budget for a frame. `None` is a missed
    /// deadline: counted, throttle-logged, front view untouched.
    pub fn fetch(&self) -> Option<&T> {
        self.fetch_timeout(self.config.fetch_timeout())
    }

    /// As [`fetch`](Self::fetch) with an explicit budget.
    pub fn fetch_timeout(&self, timeout: Duration) -> Option<&T> {
        if self.buffer().fetch_timeout(timeout) {
            self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
            Some(self.buffer().front())
        } else {
            self.record_miss();
            None
        }
    }

    /// Wait indefinitely for the next frame.
    pub fn fetch_blocking(&self) -> &T {
        self.buffer().fetch_blocking();
        self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
        self.buffer().front()
    }

    /// Copy the latest frame out, non-blocking.
    #[inline(always)]
    pub fn recv(&self) -> Option<T> {
        if unlikely(!self.buffer().try_fetch()) {
            return None;
        }
        self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
        Some(*self.buffer().front())
    }

    /// The last fetched frame. Before any successful fetch this reads the
    /// zeroed slot.
    pub fn front(&self) -> &T {
        self.buffer().front()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    fn record_miss(&self) {
        let missed = self.metrics.misses.fetch_add(1, Ordering::Relaxed) + 1;
        if (missed - 1) % self.config.miss_log_every == 0 {
            log::warn!(
                "Channel '{}': fetch deadline missed ({} total)",
                self.name,
                missed
            );
        }
    }
}

/// Cross-process channel over the [`LockFreeTripleBuffer`]. No blocking
/// syscall anywhere on the exchange path; waiting is poll-based.
pub struct LockFreeChannel<T: Pod + Send + Sync> {
    region: SharedRegion<LockFreeTripleBuffer<T>>,
    name: String,
    role: ChannelRole,
    config: ChannelConfig,
    metrics: ChannelMetrics,
}

impl<T: Pod + Send + Sync> LockFreeChannel<T> {
    pub fn create(name: &str) -> AxonResult<Self> {
        Self::create_with(name, ChannelConfig::default())
    }

    pub fn create_with(name: &str, config: ChannelConfig) -> AxonResult<Self> {
        config.validate()?;
        let region = SharedRegion::create(name)?;
        let role = ChannelRole::Producer;
        log::info!("LockFreeChannel '{}': created as {:?}", name, role);
        Ok(Self {
            region,
            name: name.to_string(),
            role,
            config,
            metrics: ChannelMetrics::default(),
        })
    }

    pub fn attach(name: &str) -> AxonResult<Self> {
        Self::attach_with(name, ChannelConfig::default())
    }

    pub fn attach_with(name: &str, config: ChannelConfig) -> AxonResult<Self> {
        config.validate()?;
        let region = SharedRegion::attach(name)?;
        let role = ChannelRole::Consumer;
        log::info!("LockFreeChannel '{}': attached as {:?}", name, role);
        Ok(Self {
            region,
            name: name.to_string(),
            role,
            config,
            metrics: ChannelMetrics::default(),
        })
    }

    #[inline(always)]
    fn buffer(&self) -> &LockFreeTripleBuffer<T> {
        self.region.get()
    }

    /// Copy `frame` into the back slot and publish it in one atomic
    /// exchange.
    #[inline(always)]
    pub fn write(&self, frame: T) {
        self.buffer().write(frame);
        self.publish();
    }

    /// Mutable access to the back slot. Pair with [`publish`](Self::publish).
    ///
    /// # Safety
    ///
    /// Same contract as [`LockFreeTripleBuffer::back_mut`].
    pub unsafe fn back_mut(&self) -> &mut T {
        self.buffer().back_mut()
    }

    pub fn publish(&self) {
        self.buffer().publish();
        self.metrics.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Adopt the middle slot; true when it carried a fresh frame.
    pub fn refresh(&self) -> bool {
        let fresh = self.buffer().refresh();
        if fresh {
            self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
        }
        fresh
    }

    /// Poll for fresh data within the configured budget. `false` is a
    /// missed deadline: counted and throttle-logged.
    pub fn wait_for_new_data(&self) -> bool {
        self.wait_for_new_data_with(self.config.fetch_timeout(), self.config.poll_interval())
    }

    pub fn wait_for_new_data_with(&self, max_wait: Duration, interval: Duration) -> bool {
        if self.buffer().wait_for_new_data(max_wait, interval) {
            self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.record_miss();
            false
        }
    }

    /// Copy the latest frame out if a fresh one is pending.
    #[inline(always)]
    pub fn recv(&self) -> Option<T> {
        if unlikely(!self.buffer().refresh()) {
            return None;
        }
        self.metrics.fetches.fetch_add(1, Ordering::Relaxed);
        Some(*self.buffer().front())
    }

    /// The front view. Meaningful after a successful refresh; a stale
    /// refresh may rotate it to an older frame.
    pub fn front(&self) -> &T {
        self.buffer().front()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    fn record_miss(&self) {
        let missed = self.metrics.misses.fetch_add(1, Ordering::Relaxed) + 1;
        if (missed - 1) % self.config.miss_log_every == 0 {
            log::warn!(
                "LockFreeChannel '{}': wait deadline missed ({} total)",
                self.name,
                missed
            );
        }
    }
}
