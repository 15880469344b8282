//! Benchmark kernels: `(working-set bytes) -> KernelStats`.
//!
//! Every kernel owns its working set for the duration of one call: it
//! allocates, initializes, times only the access loop, then drops the
//! buffers. Kernels are stateless and may run concurrently on any number of
//! threads.
//!
//! # Variants
//!
//! | Code | Variant | Access pattern |
//! |------|---------|----------------|
//! | 0 | [`Kernel::SequentialRead`] | one 8-byte load per cache line, front to back |
//!
//! Other codes are reserved (write, copy, random access) and currently map
//! to `None` in [`Kernel::from_code`].

use std::hint::black_box;
use std::mem::size_of;
use std::time::Duration;

use crate::timing::Stopwatch;

/// Working-set size the harness uses when none is configured.
pub const DEFAULT_WORKING_SET_BYTES: u64 = 1_000_000_000;

/// Cache line size assumed for stride computation (x86_64).
pub const CACHE_LINE_BYTES: usize = 64;

/// Element type of the kernel buffers.
pub type Elem = u64;

/// Distance between consecutive loads, in elements: one load per line.
pub const STRIDE_ELEMS: usize = CACHE_LINE_BYTES / size_of::<Elem>();

/// Fill value for every buffer element. Non-zero so pages are really
/// committed instead of mapped to the shared zero page.
const FILL: Elem = 1;

/// Measurement from a single kernel invocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelStats {
    /// Working-set size the kernel was asked for.
    pub bytes: u64,
    /// Wall time of the access loop only.
    pub elapsed: Duration,
    /// TSC ticks of the access loop, when a cycle counter exists.
    pub cycles: Option<u64>,
    /// Number of element loads the loop issued.
    pub elements_touched: u64,
}

impl KernelStats {
    /// Throughput in bytes per second.
    ///
    /// Elapsed time is floored at 1 ns so a zero-byte run yields `0.0`.
    pub fn bandwidth(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64().max(1e-9);
        self.bytes as f64 / secs
    }
}

/// Closed set of benchmark kernels, selected once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Kernel {
    /// Strided sequential read over the full working set.
    SequentialRead,
}

impl Kernel {
    /// Every registered kernel, in code order.
    pub const ALL: &'static [Kernel] = &[Kernel::SequentialRead];

    /// Looks up a kernel by its command-line code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::SequentialRead),
            _ => None,
        }
    }

    /// Command-line code for this kernel.
    pub fn code(self) -> i64 {
        match self {
            Self::SequentialRead => 0,
        }
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::SequentialRead => "sequential-read",
        }
    }

    /// Runs the kernel once over a working set of `bytes`.
    #[inline]
    pub fn run(self, bytes: u64) -> KernelStats {
        match self {
            Self::SequentialRead => bench_read(bytes),
        }
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sequential strided read.
///
/// Allocates an active buffer and a decoy of `bytes / 8` elements each,
/// fills both, then times a loop that loads every [`STRIDE_ELEMS`]-th
/// element of the active buffer. The decoy is never read in the loop; it
/// only adds memory pressure.
#[inline(never)]
pub fn bench_read(bytes: u64) -> KernelStats {
    let len = usize::try_from(bytes).unwrap_or(usize::MAX) / size_of::<Elem>();
    let buffer: Vec<Elem> = vec![FILL; len];
    let decoy: Vec<Elem> = vec![FILL; len];

    let sw = Stopwatch::start();
    let touched = read_strided(&buffer);
    let lap = sw.stop();

    black_box(&decoy);

    KernelStats {
        bytes,
        elapsed: lap.wall,
        cycles: lap.cycles,
        elements_touched: touched,
    }
}

/// Loads every `STRIDE_ELEMS`-th element, returning the load count.
#[inline(always)]
fn read_strided(buffer: &[Elem]) -> u64 {
    let mut touched = 0u64;
    for i in (0..buffer.len()).step_by(STRIDE_ELEMS) {
        black_box(buffer[i]);
        touched += 1;
    }
    touched
}
