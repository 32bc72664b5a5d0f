//! Shared measurement plumbing for the Axon benchmark suite.
//!
//! Latency is measured in CPU cycles via the timestamp counter where the
//! architecture has one; elsewhere the wall clock stands in and the numbers
//! are nanoseconds instead of cycles.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::_rdtsc;

/// Read the CPU timestamp counter.
#[inline(always)]
pub fn rdtsc() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        _rdtsc()
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }
}

/// Calibrate the counter overhead with back-to-back reads.
pub fn calibrate_rdtsc() -> u64 {
    let mut min_cost = u64::MAX;

    for _ in 0..100 {
        let _ = rdtsc();
    }

    for _ in 0..1000 {
        let start = rdtsc();
        let end = rdtsc();
        let cost = end.wrapping_sub(start);
        if cost > 0 && cost < min_cost {
            min_cost = cost;
        }
    }

    min_cost
}

pub fn median(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

pub fn percentile(values: &[u64], p: usize) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = (sorted.len() * p) / 100;
    sorted[idx.min(sorted.len() - 1)]
}

/// Benchmark frame carrying the producer's timestamp, padded to one
/// cache line.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StampFrame {
    pub seq: u64,
    pub sent_tsc: u64,
    pub pad: [u64; 6],
}

impl StampFrame {
    pub fn new(seq: u64, sent_tsc: u64) -> Self {
        Self {
            seq,
            sent_tsc,
            pad: [0; 6],
        }
    }
}
