//! # Exchange layer for Axon
//!
//! This module provides the single-producer single-consumer frame exchanges
//! that carry control traffic between processes:
//!
//! - **Channel**: triple-buffered exchange with futex wakeups, for consumers
//!   that block on their cycle deadline
//! - **LockFreeChannel**: wait-free triple-buffered exchange, for hard
//!   real-time loops that must never touch a kernel lock
//! - **SharedCell**: single mutex-guarded value, for low-rate state
//!
//! ## Usage Patterns
//!
//! **Deadline-driven consumer (motion cycle):**
//! ```rust,no_run
//! use axon_core::ipc::Channel;
//! use std::time::Duration;
//!
//! let channel: Channel<[f32; 25]> = Channel::attach("joint_targets").unwrap();
//! if channel.fetch_timeout(Duration::from_millis(11)).is_some() {
//!     let targets = channel.front();
//! }
//! ```
//!
//! **Hard real-time consumer:**
//! ```rust,no_run
//! use axon_core::ipc::LockFreeChannel;
//!
//! let channel: LockFreeChannel<u64> = LockFreeChannel::attach("cycle_count").unwrap();
//! if channel.refresh() {
//!     let count = channel.front();
//! }
//! ```

pub mod channel;
pub mod config;
pub mod futex;
pub mod lock_free;
pub mod shared_cell;
pub mod triple_buffer;

// Re-export commonly used types for convenience
pub use channel::{Channel, ChannelMetrics, ChannelRole, LockFreeChannel};
pub use config::ChannelConfig;
pub use futex::{RawCondvar, RawMutex};
pub use lock_free::LockFreeTripleBuffer;
pub use shared_cell::SharedCell;
pub use triple_buffer::TripleBuffer;
