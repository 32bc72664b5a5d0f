//! Payload frames exchanged over the channels.
//!
//! The exchange layer moves raw fixed-size bytes and is version-agnostic.
//! The contract that makes those bytes interpretable lives here: every
//! frame embeds a protocol version tag the consumer validates before
//! trusting a single field, plus a producer-side tick for gap accounting.
//! A mismatching version means the two processes are running incompatible
//! builds, which is fatal to the consumer by convention.
//!
//! Frames are `#[repr(C)]` and memcpy-safe across process boundaries: no
//! pointers, no heap, explicit padding fields where the layout needs them.

pub mod control;
pub mod packed;

use crate::error::{AxonError, AxonResult};
use bytemuck::Zeroable;
use serde::{Deserialize, Serialize};

pub use control::{ControlBlock, ControlLink, LinkSide};
pub use packed::PackedFrame;

/// Compiled-in protocol version, embedded in every frame at construction.
pub const PROTOCOL_VERSION: u8 = 1;

/// Joint count of the target platform.
pub const NUM_JOINTS: usize = 25;

/// Payloads carrying a version tag the consumer can validate.
pub trait Versioned {
    const VERSION: u8;

    fn version(&self) -> u8;

    /// Validate the embedded tag against the compiled-in expectation.
    fn check(&self) -> AxonResult<()> {
        if self.version() != Self::VERSION {
            return Err(AxonError::VersionMismatch {
                expected: Self::VERSION,
                found: self.version(),
            });
        }
        Ok(())
    }
}

/// Battery state as reported by the power board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct BatteryState {
    pub charge: f32,
    pub current: f32,
    pub temperature: f32,
    pub status: f32,
}

/// Inertial measurement snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct ImuState {
    pub accelerometer: [f32; 3],
    pub gyroscope: [f32; 3],
}

/// One sensor snapshot, published by the hardware backend every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct SensorFrame {
    /// Producer cycle counter. Consumers use it for gap accounting; it
    /// never decreases within one backend run.
    pub tick: u64,
    pub stamp_nanos: u64,
    pub version: u8,
    /// Nonzero while the backend is receiving data from the hardware.
    pub connected: u8,
    pub _pad: [u8; 2],
    pub battery: BatteryState,
    pub imu: ImuState,
    pub positions: [f32; NUM_JOINTS],
    pub currents: [f32; NUM_JOINTS],
    pub temperatures: [f32; NUM_JOINTS],
}

impl SensorFrame {
    /// Zeroed frame stamped with the current clock and protocol version.
    pub fn new() -> Self {
        let mut frame = Self::zeroed();
        frame.version = PROTOCOL_VERSION;
        frame.stamp_nanos = now_nanos();
        frame
    }

    pub fn is_connected(&self) -> bool {
        self.connected != 0
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected as u8;
    }
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl Versioned for SensorFrame {
    const VERSION: u8 = PROTOCOL_VERSION;

    fn version(&self) -> u8 {
        self.version
    }
}

// Enable zero-copy exchange with bytemuck
unsafe impl bytemuck::Pod for SensorFrame {}
unsafe impl bytemuck::Zeroable for SensorFrame {}
unsafe impl bytemuck::Pod for BatteryState {}
unsafe impl bytemuck::Zeroable for BatteryState {}
unsafe impl bytemuck::Pod for ImuState {}
unsafe impl bytemuck::Zeroable for ImuState {}

/// One actuator command, published by the control frontend every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct CommandFrame {
    /// Frontend cycle counter, echoed for liveness detection.
    pub tick: u64,
    pub stamp_nanos: u64,
    pub version: u8,
    pub _pad: [u8; 3],
    pub positions: [f32; NUM_JOINTS],
    pub stiffness: [f32; NUM_JOINTS],
    pub chest_led: [f32; 3],
}

impl CommandFrame {
    /// Zeroed frame stamped with the current clock and protocol version.
    pub fn new() -> Self {
        let mut frame = Self::zeroed();
        frame.version = PROTOCOL_VERSION;
        frame.stamp_nanos = now_nanos();
        frame
    }
}

impl Default for CommandFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl Versioned for CommandFrame {
    const VERSION: u8 = PROTOCOL_VERSION;

    fn version(&self) -> u8 {
        self.version
    }
}

unsafe impl bytemuck::Pod for CommandFrame {}
unsafe impl bytemuck::Zeroable for CommandFrame {}

fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
