//! Aggregate memory read bandwidth, one pinned participant per hardware thread.
//!
//! ## Scope
//! Runs the same memory kernel concurrently on every logical core and sums
//! the per-core throughput. The measurement is only meaningful if every
//! participant's timed region overlaps the others, so the crate is mostly
//! about synchronization discipline rather than the kernel itself.
//!
//! ## Key invariants
//! - No participant starts its timed region before every participant has
//!   arrived at the start rendezvous.
//! - Each participant times only its own access loop (wall clock bracketing
//!   a serialized cycle-counter window).
//! - Result slot `i` is written only by participant `i`; the harness reads
//!   slots only after every participant has departed.
//! - Setup failures (pinning, spawning) release all waiters instead of
//!   leaving them spinning.
//!
//! ## Run flow
//! `HarnessConfig -> spawn N-1 pinned workers -> rendezvous (start) ->
//! Kernel -> ResultSlots -> rendezvous (finish) -> RunReport`
//!
//! ## Notable entry points
//! - [`run`] / [`run_with`]: execute one run.
//! - [`Kernel`]: closed set of benchmark kernels.
//! - [`Rendezvous`]: the two-phase spin rendezvous.
//! - [`timing::Stopwatch`]: wall clock plus cycle counter bracketing.

pub mod affinity;
pub mod harness;
pub mod kernel;
pub mod participant;
pub mod rendezvous;
pub mod report;
pub mod slots;
pub mod timing;

pub use harness::{run, run_with, CoreMap, HarnessConfig, RunError};
pub use kernel::{Kernel, KernelStats, DEFAULT_WORKING_SET_BYTES};
pub use rendezvous::{Aborted, Rendezvous};
pub use report::RunReport;
pub use slots::ResultSlots;
