//! Duplex sensor/command link between hardware backend and control
//! frontend.
//!
//! One segment, two exchanges: sensors flow up from the process talking to
//! the hardware, commands flow down from the control stack. The backend
//! creates the segment and must be running before the frontend starts;
//! a frontend attach against a missing backend is a startup abort, not a
//! retry loop.

use crate::error::{AxonError, AxonResult};
use crate::ipc::config::ChannelConfig;
use crate::ipc::triple_buffer::TripleBuffer;
use crate::frames::{CommandFrame, SensorFrame, Versioned};
use crate::memory::{SharedRegion, ShmSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Segment layout of one duplex link.
#[repr(C)]
pub struct ControlBlock {
    pub sensors: TripleBuffer<SensorFrame>,
    pub commands: TripleBuffer<CommandFrame>,
}

unsafe impl ShmSafe for ControlBlock {
    fn init_in_place(&self) {
        self.sensors.init_in_place();
        self.commands.init_in_place();
    }
}

/// Which process this end is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    /// Talks to the hardware; creates the segment, publishes sensors,
    /// fetches commands.
    Backend,
    /// Runs the control stack; attaches, fetches sensors, publishes
    /// commands.
    Frontend,
}

/// One end of the duplex link.
///
/// Both sides see both exchanges; which operations a side calls is the
/// same convention that governs every channel. Missed deadlines on either
/// exchange are counted and throttle-logged, never fatal: the control
/// cycle continues with the previous frame.
pub struct ControlLink {
    region: SharedRegion<ControlBlock>,
    side: LinkSide,
    config: ChannelConfig,
    sensor_misses: AtomicU64,
    command_misses: AtomicU64,
}

impl ControlLink {
    /// Create the link as the hardware backend.
    pub fn backend(name: &str) -> AxonResult<Self> {
        Self::backend_with(name, ChannelConfig::default())
    }

    pub fn backend_with(name: &str, config: ChannelConfig) -> AxonResult<Self> {
        config.validate()?;
        let region = SharedRegion::create(name)?;
        log::info!("ControlLink '{}': backend up", name);
        Ok(Self {
            region,
            side: LinkSide::Backend,
            config,
            sensor_misses: AtomicU64::new(0),
            command_misses: AtomicU64::new(0),
        })
    }

    /// Attach to the link as the control frontend. The backend must
    /// already be running.
    pub fn frontend(name: &str) -> AxonResult<Self> {
        Self::frontend_with(name, ChannelConfig::default())
    }

    pub fn frontend_with(name: &str, config: ChannelConfig) -> AxonResult<Self> {
        config.validate()?;
        let region = SharedRegion::attach(name).map_err(|e| match e {
            AxonError::NotFound(_) => AxonError::not_found(format!(
                "Control link '{}': backend is not running",
                name
            )),
            other => other,
        })?;
        log::info!("ControlLink '{}': frontend attached", name);
        Ok(Self {
            region,
            side: LinkSide::Frontend,
            config,
            sensor_misses: AtomicU64::new(0),
            command_misses: AtomicU64::new(0),
        })
    }

    fn block(&self) -> &ControlBlock {
        self.region.get()
    }

    pub fn side(&self) -> LinkSide {
        self.side
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    // Backend cycle

    /// Publish one sensor snapshot. Never waits for the frontend.
    pub fn publish_sensors(&self, frame: &SensorFrame) {
        let block = self.block();
        block.sensors.write(*frame);
        block.sensors.commit();
    }

    /// Wait up to `timeout` for a fresh command frame. A miss keeps the
    /// previous command in view, so actuators coast on the last request.
    pub fn fetch_commands(&self, timeout: Duration) -> bool {
        if self.block().commands.fetch_timeout(timeout) {
            true
        } else {
            self.record_miss(&self.command_misses, "command");
            false
        }
    }

    /// The last fetched command frame.
    pub fn commands(&self) -> &CommandFrame {
        self.block().commands.front()
    }

    // Frontend cycle

    /// Wait up to `timeout` for a fresh sensor snapshot.
    pub fn fetch_sensors(&self, timeout: Duration) -> bool {
        if self.block().sensors.fetch_timeout(timeout) {
            true
        } else {
            self.record_miss(&self.sensor_misses, "sensor");
            false
        }
    }

    /// The last fetched sensor snapshot, without version validation.
    pub fn sensors(&self) -> &SensorFrame {
        self.block().sensors.front()
    }

    /// The last fetched sensor snapshot, after validating its version tag.
    /// A mismatch means backend and frontend are incompatible builds;
    /// callers treat it as fatal.
    pub fn sensors_checked(&self) -> AxonResult<&SensorFrame> {
        let frame = self.sensors();
        frame.check()?;
        Ok(frame)
    }

    /// Publish one command frame. Never waits for the backend.
    pub fn publish_commands(&self, frame: &CommandFrame) {
        let block = self.block();
        block.commands.write(*frame);
        block.commands.commit();
    }

    pub fn sensor_misses(&self) -> u64 {
        self.sensor_misses.load(Ordering::Relaxed)
    }

    pub fn command_misses(&self) -> u64 {
        self.command_misses.load(Ordering::Relaxed)
    }

    fn record_miss(&self, counter: &AtomicU64, what: &str) {
        let missed = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if (missed - 1) % self.config.miss_log_every == 0 {
            log::warn!(
                "ControlLink '{}': {} fetch took too long ({} missed)",
                self.name(),
                what,
                missed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::PROTOCOL_VERSION;

    fn unique(name: &str) -> String {
        format!("{}_{}", name, std::process::id())
    }

    #[test]
    fn test_duplex_cycle() {
        let name = unique("link_cycle");
        let backend = ControlLink::backend(&name).unwrap();
        let frontend = ControlLink::frontend(&name).unwrap();

        assert_eq!(backend.side(), LinkSide::Backend);
        assert_eq!(frontend.side(), LinkSide::Frontend);

        // Backend publishes a snapshot, frontend picks it up and validates.
        let mut sensors = SensorFrame::new();
        sensors.tick = 1;
        sensors.set_connected(true);
        sensors.positions[0] = 0.5;
        backend.publish_sensors(&sensors);

        assert!(frontend.fetch_sensors(Duration::from_millis(100)));
        let seen = frontend.sensors_checked().unwrap();
        assert_eq!(seen.tick, 1);
        assert!(seen.is_connected());

        // Frontend answers with a command, backend picks it up.
        let mut command = CommandFrame::new();
        command.tick = 1;
        command.stiffness = [0.8; crate::frames::NUM_JOINTS];
        frontend.publish_commands(&command);

        assert!(backend.fetch_commands(Duration::from_millis(100)));
        assert_eq!(backend.commands().tick, 1);
    }

    #[test]
    fn test_frontend_without_backend_aborts() {
        let err = ControlLink::frontend(&unique("link_orphan")).err().unwrap();
        match err {
            AxonError::NotFound(msg) => assert!(msg.contains("backend is not running")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_version_mismatch_is_loud() {
        let name = unique("link_version");
        let backend = ControlLink::backend(&name).unwrap();
        let frontend = ControlLink::frontend(&name).unwrap();

        let mut sensors = SensorFrame::new();
        sensors.version = PROTOCOL_VERSION.wrapping_add(7);
        backend.publish_sensors(&sensors);

        assert!(frontend.fetch_sensors(Duration::from_millis(100)));
        let err = frontend.sensors_checked().unwrap_err();
        assert!(matches!(err, AxonError::VersionMismatch { .. }));
    }

    #[test]
    fn test_misses_counted_on_both_exchanges() {
        let name = unique("link_miss");
        let backend = ControlLink::backend(&name).unwrap();
        let frontend = ControlLink::frontend(&name).unwrap();

        assert!(!frontend.fetch_sensors(Duration::from_millis(5)));
        assert!(!backend.fetch_commands(Duration::from_millis(5)));

        assert_eq!(frontend.sensor_misses(), 1);
        assert_eq!(backend.command_misses(), 1);
        // The other side's counters are untouched.
        assert_eq!(frontend.command_misses(), 0);
        assert_eq!(backend.sensor_misses(), 0);
    }
}
