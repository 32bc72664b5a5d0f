// End-to-end exchange tests across separate mappings of one segment,
// covering the properties the control cycle depends on.
use axon_core::frames::{CommandFrame, ControlLink, SensorFrame, NUM_JOINTS};
use axon_core::ipc::{Channel, LockFreeChannel};
use axon_core::AxonError;
use std::thread;
use std::time::{Duration, Instant};

const TOTAL_FRAMES: u64 = 20_000;
const DUPLEX_CYCLES: u64 = 50;

fn unique(tag: &str) -> String {
    format!("itest_{}_{}", tag, std::process::id())
}

/// A frame whose words must all match; any mismatch is a torn read.
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Burst {
    words: [u64; 8],
}

impl Burst {
    fn new(seq: u64) -> Self {
        Self { words: [seq; 8] }
    }

    fn seq(&self) -> u64 {
        let seq = self.words[0];
        for &word in &self.words[1..] {
            assert_eq!(word, seq, "torn frame");
        }
        seq
    }
}

#[test]
fn test_frames_never_tear_under_load() {
    let name = unique("tear_lock");
    let producer: Channel<Burst> = Channel::create(&name).unwrap();
    let consumer_name = name.clone();

    let consumer = thread::spawn(move || {
        let channel: Channel<Burst> = Channel::attach(&consumer_name).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut last = 0u64;
        let mut observed = 0u64;
        loop {
            if let Some(frame) = channel.try_fetch() {
                let seq = frame.seq();
                assert!(seq >= last, "sequence went backwards: {} after {}", seq, last);
                last = seq;
                observed += 1;
                if seq == TOTAL_FRAMES {
                    return observed;
                }
            }
            assert!(Instant::now() < deadline, "consumer starved at seq {}", last);
        }
    });

    for seq in 1..=TOTAL_FRAMES {
        producer.write(Burst::new(seq));
    }

    let observed = consumer.join().unwrap();
    assert!(observed >= 1);
}

#[test]
fn test_lock_free_frames_never_tear_under_load() {
    let name = unique("tear_lf");
    let producer: LockFreeChannel<Burst> = LockFreeChannel::create(&name).unwrap();
    let consumer_name = name.clone();

    let consumer = thread::spawn(move || {
        let channel: LockFreeChannel<Burst> = LockFreeChannel::attach(&consumer_name).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut last = 0u64;
        loop {
            if channel.refresh() {
                let seq = channel.front().seq();
                assert!(seq >= last, "sequence went backwards: {} after {}", seq, last);
                last = seq;
                if seq == TOTAL_FRAMES {
                    return;
                }
            }
            assert!(Instant::now() < deadline, "consumer starved at seq {}", last);
        }
    });

    for seq in 1..=TOTAL_FRAMES {
        producer.write(Burst::new(seq));
    }

    consumer.join().unwrap();
}

#[test]
fn test_producer_never_blocks_on_stalled_consumer() {
    let name = unique("stall");
    let producer: Channel<Burst> = Channel::create(&name).unwrap();
    // Attached but never fetching.
    let _consumer: Channel<Burst> = Channel::attach(&name).unwrap();

    let mut latencies = Vec::with_capacity(10_000);
    for seq in 0..10_000u64 {
        let start = Instant::now();
        producer.write(Burst::new(seq));
        latencies.push(start.elapsed());
    }

    latencies.sort();
    let p99 = latencies[latencies.len() * 99 / 100];
    assert!(p99 < Duration::from_millis(1), "write p99 too slow: {:?}", p99);
}

#[test]
fn test_consumer_sees_latest_after_stall() {
    let name = unique("latest");
    let producer: Channel<u64> = Channel::create(&name).unwrap();
    let consumer: Channel<u64> = Channel::attach(&name).unwrap();

    for value in 1..=100u64 {
        producer.write(value);
    }

    assert_eq!(consumer.recv(), Some(100));
    // Nothing newer arrived, so the next poll reports silence.
    assert!(consumer.try_fetch().is_none());
}

#[test]
fn test_sensor_frame_survives_bit_exact() {
    let name = unique("bits");
    let producer: Channel<SensorFrame> = Channel::create(&name).unwrap();
    let consumer: Channel<SensorFrame> = Channel::attach(&name).unwrap();

    let mut frame = SensorFrame::new();
    frame.tick = 7_000_000_017;
    frame.set_connected(true);
    frame.battery.charge = 0.87;
    frame.imu.gyroscope = [0.01, -0.02, 1.570_796_3];
    for joint in 0..NUM_JOINTS {
        frame.positions[joint] = (joint as f32) * 0.1 - 1.2;
        frame.currents[joint] = 0.05 * joint as f32;
        frame.temperatures[joint] = 31.0 + joint as f32;
    }

    producer.write(frame);

    let received = consumer.recv().expect("fresh frame on first fetch");
    assert_eq!(bytemuck::bytes_of(&frame), bytemuck::bytes_of(&received));
}

#[test]
fn test_missed_deadline_leaves_no_trace() {
    let name = unique("deadline");
    let producer: Channel<u64> = Channel::create(&name).unwrap();
    let consumer: Channel<u64> = Channel::attach(&name).unwrap();

    producer.write(41);
    assert_eq!(consumer.recv(), Some(41));

    let start = Instant::now();
    assert!(consumer.fetch_timeout(Duration::from_millis(50)).is_none());
    let waited = start.elapsed();

    assert!(waited >= Duration::from_millis(45), "returned early: {:?}", waited);
    assert!(waited < Duration::from_millis(500), "overslept: {:?}", waited);
    // The stale frame is still in view, untouched.
    assert_eq!(*consumer.front(), 41);
    assert_eq!(consumer.metrics().misses(), 1);
}

#[test]
fn test_region_lifecycle() {
    let name = unique("lifecycle");

    match Channel::<u64>::attach(&name) {
        Err(AxonError::NotFound(_)) => {}
        Ok(_) => panic!("attach succeeded without a producer"),
        Err(e) => panic!("unexpected error: {}", e),
    }

    let producer: Channel<u64> = Channel::create(&name).unwrap();
    producer.write(9);
    {
        let consumer: Channel<u64> = Channel::attach(&name).unwrap();
        assert_eq!(consumer.recv(), Some(9));
    }

    // Consumer detach leaves the segment in place; creator drop unlinks it.
    drop(producer);
    match Channel::<u64>::attach(&name) {
        Err(AxonError::NotFound(_)) => {}
        Ok(_) => panic!("segment survived its creator"),
        Err(e) => panic!("unexpected error: {}", e),
    }
}

#[test]
fn test_duplex_link_runs_lockstep_cycles() {
    let name = unique("duplex");
    let backend = ControlLink::backend(&name).unwrap();
    let frontend_name = name.clone();

    let frontend = thread::spawn(move || {
        let link = ControlLink::frontend(&frontend_name).unwrap();
        for _ in 0..DUPLEX_CYCLES {
            assert!(
                link.fetch_sensors(Duration::from_secs(2)),
                "sensor cycle missed"
            );
            let tick = link.sensors_checked().unwrap().tick;
            let mut command = CommandFrame::new();
            command.tick = tick;
            command.positions[3] = tick as f32 * 0.001;
            link.publish_commands(&command);
        }
        link.sensor_misses()
    });

    for tick in 1..=DUPLEX_CYCLES {
        let mut sensors = SensorFrame::new();
        sensors.tick = tick;
        sensors.set_connected(true);
        backend.publish_sensors(&sensors);

        assert!(
            backend.fetch_commands(Duration::from_secs(2)),
            "command cycle missed"
        );
        assert_eq!(
            backend.commands().tick,
            tick,
            "frontend answered a different cycle"
        );
    }

    assert_eq!(frontend.join().unwrap(), 0);
    assert_eq!(backend.command_misses(), 0);
}
