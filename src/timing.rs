//! Cycle counter reads and the wall-clock stopwatch that brackets them.
//!
//! # Serialization
//!
//! The TSC read must not drift into or out of the measured region:
//! - `cycles_start`: `CPUID` first (waits for all prior instructions), then
//!   `RDTSC`.
//! - `cycles_stop`: `RDTSCP` first (waits for prior instructions to retire
//!   before sampling), then `CPUID` so later instructions cannot start early.
//!
//! # Wall time wins
//!
//! Cycle counts do not account for frequency scaling across cores, so
//! bandwidth is always computed from the wall-clock half of a [`Lap`]. The
//! cycle half is diagnostic only and is `None` wherever the CPUID check in
//! [`cycle_counter_available`] finds no TSC or no RDTSCP.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Whether this host can read the cycle counter with serialized stops.
///
/// Checked once with CPUID and cached: TSC (leaf 1, EDX bit 4) and RDTSCP
/// (leaf 0x8000_0001, EDX bit 27) must both be present. Hypervisors may mask
/// either, so this is never assumed from the target architecture alone.
pub fn cycle_counter_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(detect_cycle_counter)
}

#[cfg(target_arch = "x86_64")]
fn detect_cycle_counter() -> bool {
    use core::arch::x86_64::__cpuid;
    const TSC: u32 = 1 << 4;
    const RDTSCP: u32 = 1 << 27;
    // SAFETY: CPUID is available on every x86_64 CPU; unsupported leaves
    // are guarded by the max-leaf checks below.
    unsafe {
        if __cpuid(0).eax < 1 || __cpuid(1).edx & TSC == 0 {
            return false;
        }
        if __cpuid(0x8000_0000).eax < 0x8000_0001 {
            return false;
        }
        __cpuid(0x8000_0001).edx & RDTSCP != 0
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_cycle_counter() -> bool {
    false
}

/// Serializes preceding instructions, then samples the TSC.
///
/// # Safety
///
/// The host must have a TSC; check [`cycle_counter_available`] first.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub unsafe fn cycles_start() -> u64 {
    use core::arch::x86_64::{__cpuid, _rdtsc};
    __cpuid(0);
    _rdtsc()
}

/// Samples the TSC once prior instructions retire, then serializes.
///
/// # Safety
///
/// The host must support RDTSCP; check [`cycle_counter_available`] first.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub unsafe fn cycles_stop() -> u64 {
    use core::arch::x86_64::{__cpuid, __rdtscp};
    let mut aux = 0u32;
    let cycles = __rdtscp(&mut aux);
    __cpuid(0);
    cycles
}

/// Result of one stopwatch measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lap {
    /// Wall-clock time between `start` and `stop`.
    pub wall: Duration,
    /// Elapsed TSC ticks, if the host has a cycle counter.
    pub cycles: Option<u64>,
}

impl Lap {
    /// Wall time in seconds, floored at one nanosecond.
    ///
    /// The floor keeps throughput division finite for empty regions.
    #[inline]
    pub fn secs_floored(&self) -> f64 {
        self.wall.as_secs_f64().max(1e-9)
    }
}

/// Brackets a region with both the monotonic clock and the cycle counter.
///
/// Sampling order nests the cycle reads inside the clock reads so the
/// cycle window never includes `Instant::now()` overhead.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    wall_start: Instant,
    cycle_start: Option<u64>,
}

impl Stopwatch {
    #[inline(always)]
    pub fn start() -> Self {
        let wall_start = Instant::now();
        Self {
            wall_start,
            cycle_start: read_start(),
        }
    }

    #[inline(always)]
    pub fn stop(self) -> Lap {
        let cycles = self
            .cycle_start
            .and_then(|start| read_stop().map(|stop| stop.wrapping_sub(start)));
        Lap {
            wall: self.wall_start.elapsed(),
            cycles,
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_start() -> Option<u64> {
    // SAFETY: guarded by the CPUID check.
    cycle_counter_available().then(|| unsafe { cycles_start() })
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_stop() -> Option<u64> {
    // SAFETY: guarded by the CPUID check.
    cycle_counter_available().then(|| unsafe { cycles_stop() })
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
fn read_start() -> Option<u64> {
    None
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
fn read_stop() -> Option<u64> {
    None
}
