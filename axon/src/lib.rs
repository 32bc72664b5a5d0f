//! # Axon - Shared-Memory Control Substrate
//!
//! Axon carries fixed-layout frames between the processes of a robot
//! control stack through triple-buffered shared memory, with a focus on
//! bounded latency, last-value-wins semantics, and crash isolation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axon::prelude::*;
//!
//! // Hardware backend: owns the segment, publishes sensors, takes commands.
//! let link = ControlLink::backend("robot_control").unwrap();
//!
//! let mut sensors = SensorFrame::new();
//! sensors.tick = 1;
//! sensors.set_connected(true);
//! link.publish_sensors(&sensors);
//!
//! if link.fetch_commands(Duration::from_millis(11)) {
//!     let command = link.commands();
//!     let _stiffness = command.stiffness[0];
//! }
//! ```
//!
//! ## Features
//!
//! - **Triple-buffered exchanges**: writers never wait, readers never tear
//! - **Futex wakeups** for deadline-driven consumers
//! - **Lock-free variant** for hard real-time loops
//! - **Versioned frames** that fail loudly across incompatible builds

// Re-export core components
pub use axon_core::{self, *};

/// The Axon prelude - everything you need to get started
pub mod prelude {
    // Exchange types
    pub use axon_core::ipc::{
        Channel, ChannelConfig, ChannelRole, LockFreeChannel, SharedCell,
    };

    // Frame types and the duplex link
    pub use axon_core::frames::{
        CommandFrame, ControlLink, LinkSide, PackedFrame, SensorFrame,
    };

    // Shared-memory plumbing
    pub use axon_core::memory::{SharedRegion, ShmSafe};

    // Error types
    pub use axon_core::error::{AxonError, AxonResult};
    pub type Result<T> = AxonResult<T>;

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::{Duration, Instant};

    // Common traits
    pub use serde::{Deserialize, Serialize};

    // Re-export anyhow for error handling
    pub use anyhow::{anyhow, bail, ensure, Context, Result as AnyResult};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get Axon version
pub fn version() -> &'static str {
    VERSION
}
