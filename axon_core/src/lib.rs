//! # Axon Core
//!
//! The core exchange runtime for the Axon control substrate.
//!
//! Axon moves fixed-layout frames between a hardware backend process and a
//! control frontend process through shared memory, tuned for millisecond
//! control cycles. This crate provides the fundamental building blocks:
//!
//! - **Memory**: typed shared-memory regions with in-place initialization
//! - **Ipc**: triple-buffered frame exchanges, futex primitives, and the
//!   lock-free variant for hard real-time consumers
//! - **Frames**: the sensor and command frame layouts plus the duplex
//!   control link built from them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axon_core::Channel;
//!
//! // Producer process
//! let out: Channel<[f32; 3]> = Channel::create("imu_gyro").unwrap();
//! out.write([0.0, 0.0, 0.7]);
//!
//! // Consumer process
//! let gyro: Channel<[f32; 3]> = Channel::attach("imu_gyro").unwrap();
//! if let Some(sample) = gyro.recv() {
//!     assert_eq!(sample[2], 0.7);
//! }
//! ```

pub mod error;
pub mod frames;
pub mod ipc;
pub mod memory;

// Re-export commonly used types for easy access
pub use error::{AxonError, AxonResult};
pub use frames::{CommandFrame, ControlLink, PackedFrame, SensorFrame};
pub use ipc::{Channel, ChannelConfig, ChannelRole, LockFreeChannel, SharedCell};
pub use memory::{SharedRegion, ShmSafe};
