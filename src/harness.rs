//! Parallel bandwidth harness: one participant per hardware thread.
//!
//! # Run lifecycle
//!
//! ```text
//! harness thread                 worker i (0..N-1)
//! --------------                 -----------------
//! resolve N, cores
//! spawn workers ──────────────▶  pin to cores[i]   (failure: abort)
//!                                arrive_and_wait
//! arrive_and_wait  ◀── gate opens when all N have arrived ──▶
//! kernel (timed)                 kernel (timed)
//! slot[N-1] = bw                 slot[i] = bw
//! depart                         depart
//! wait_all_departed
//! join workers, sum slots
//! ```
//!
//! The harness thread is participant `N-1` and is not pinned.
//!
//! # Failure handling
//!
//! Workers pin themselves *before* arriving, so a pinning failure can only
//! happen while the gate is still closed. The failing worker aborts the
//! rendezvous; every other participant is released with `Aborted`, skips its
//! kernel, and returns. The harness joins everyone and reports the most
//! specific error. A panic inside a kernel aborts the rendezvous the same
//! way, so the harness never waits on a departure that cannot happen.

use std::fmt;
use std::io;
use std::thread;

use crate::affinity;
use crate::kernel::{Kernel, KernelStats, DEFAULT_WORKING_SET_BYTES};
use crate::participant::ParticipantGuard;
use crate::rendezvous::Rendezvous;
use crate::report::{participant_line, RunReport};
use crate::slots::ResultSlots;

// ============================================================================
// Configuration
// ============================================================================

/// How spawned workers map onto logical cores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoreMap {
    /// Worker `i` runs on core `i`.
    #[default]
    Identity,
    /// Worker `i` runs on the `i`-th CPU of the process's allowed set,
    /// wrapping around if there are more workers than allowed CPUs.
    Allowed,
}

/// Configuration for one harness run.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Working-set size handed to every participant's kernel.
    pub working_set_bytes: u64,

    /// Total participants including the harness thread.
    ///
    /// None = hardware concurrency.
    pub participants: Option<usize>,

    /// Whether spawned workers pin themselves before the start rendezvous.
    pub pin_workers: bool,

    /// Worker-to-core assignment when pinning.
    pub core_map: CoreMap,

    /// Print each participant's `<bw> B/s` line as it finishes.
    pub echo: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            working_set_bytes: DEFAULT_WORKING_SET_BYTES,
            participants: None,
            pin_workers: true,
            core_map: CoreMap::Identity,
            echo: true,
        }
    }
}

impl HarnessConfig {
    /// Small working set, no pinning, no output. For smoke runs and tests.
    pub fn quick() -> Self {
        Self {
            working_set_bytes: 1 << 20,
            participants: None,
            pin_workers: false,
            core_map: CoreMap::Allowed,
            echo: false,
        }
    }

    /// Resolved participant count, never less than 1.
    pub fn participant_count(&self) -> usize {
        self.participants
            .unwrap_or_else(affinity::num_cpus)
            .max(1)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from a harness run.
#[derive(Debug)]
#[non_exhaustive]
pub enum RunError {
    /// A worker could not be pinned to its core.
    Affinity {
        participant: usize,
        core: usize,
        source: io::Error,
    },
    /// The allowed CPU set could not be read.
    CoreDiscovery(io::Error),
    /// A worker thread could not be spawned.
    Spawn(io::Error),
    /// A participant panicked (typically a fault inside its kernel).
    ParticipantPanicked { participant: usize },
    /// A participant finished without publishing its result.
    MissingResult { participant: usize },
    /// The rendezvous was aborted without an attributable cause.
    Aborted,
}

impl RunError {
    /// Raw OS error code behind this failure, if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Affinity { source, .. } | Self::CoreDiscovery(source) | Self::Spawn(source) => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// Ranks errors so the root cause wins over its `Aborted` echoes.
    fn specificity(&self) -> u8 {
        match self {
            Self::Aborted => 0,
            Self::MissingResult { .. } => 1,
            Self::ParticipantPanicked { .. } => 2,
            Self::Spawn(_) | Self::CoreDiscovery(_) => 3,
            Self::Affinity { .. } => 4,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Affinity {
                participant,
                core,
                source,
            } => write!(
                f,
                "failed to pin participant {participant} to core {core}: {source}"
            ),
            Self::CoreDiscovery(err) => write!(f, "failed to read allowed CPU set: {err}"),
            Self::Spawn(err) => write!(f, "failed to spawn worker thread: {err}"),
            Self::ParticipantPanicked { participant } => {
                write!(f, "participant {participant} panicked")
            }
            Self::MissingResult { participant } => {
                write!(f, "participant {participant} did not publish a result")
            }
            Self::Aborted => write!(f, "run aborted"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Affinity { source, .. } | Self::CoreDiscovery(source) | Self::Spawn(source) => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Keeps whichever error better explains the failure.
fn keep_specific(slot: &mut Option<RunError>, err: RunError) {
    match slot {
        Some(prev) if prev.specificity() >= err.specificity() => {}
        _ => *slot = Some(err),
    }
}

// ============================================================================
// Run
// ============================================================================

/// Shared state for one run, borrowed by every participant.
struct RunCtx<'a, K> {
    kernel: &'a K,
    working_set_bytes: u64,
    echo: bool,
    rendezvous: &'a Rendezvous,
    slots: &'a ResultSlots,
}

/// Aborts the rendezvous if the owning participant unwinds.
struct AbortOnPanic<'a>(&'a Rendezvous);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

/// Runs `kernel` once on every participant and sums the results.
pub fn run(config: &HarnessConfig, kernel: Kernel) -> Result<RunReport, RunError> {
    run_with(config, &|bytes: u64| kernel.run(bytes))
}

/// Like [`run`], with an arbitrary `(size) -> stats` kernel.
///
/// The kernel is shared by reference across all participant threads.
pub fn run_with<K>(config: &HarnessConfig, kernel: &K) -> Result<RunReport, RunError>
where
    K: Fn(u64) -> KernelStats + Sync,
{
    let participants = config.participant_count();
    let workers = participants - 1;
    let cores = assign_cores(config, workers)?;

    let rendezvous = Rendezvous::new(participants);
    let slots = ResultSlots::new(participants);
    let ctx = RunCtx {
        kernel,
        working_set_bytes: config.working_set_bytes,
        echo: config.echo,
        rendezvous: &rendezvous,
        slots: &slots,
    };

    let mut failure: Option<RunError> = None;
    thread::scope(|s| {
        let ctx = &ctx;
        let mut handles = Vec::with_capacity(workers);
        for (id, &core) in cores.iter().enumerate() {
            let spawned = thread::Builder::new()
                .name(format!("cachebench-{id}"))
                .spawn_scoped(s, move || participate(ctx, id, core));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    rendezvous.abort();
                    keep_specific(&mut failure, RunError::Spawn(err));
                    break;
                }
            }
        }

        if failure.is_none() {
            let own = participate(ctx, workers, None)
                .and_then(|()| rendezvous.wait_all_departed().map_err(|_| RunError::Aborted));
            if let Err(err) = own {
                keep_specific(&mut failure, err);
            }
        }

        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => keep_specific(&mut failure, err),
                Err(_) => keep_specific(
                    &mut failure,
                    RunError::ParticipantPanicked { participant: id },
                ),
            }
        }
    });

    if let Some(err) = failure {
        return Err(err);
    }

    let per_participant = slots
        .snapshot()
        .into_iter()
        .enumerate()
        .map(|(participant, bw)| bw.ok_or(RunError::MissingResult { participant }))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RunReport::new(config.working_set_bytes, per_participant))
}

/// Core for each spawned worker, or `None` per worker when not pinning.
fn assign_cores(config: &HarnessConfig, workers: usize) -> Result<Vec<Option<usize>>, RunError> {
    if !config.pin_workers {
        return Ok(vec![None; workers]);
    }
    match config.core_map {
        CoreMap::Identity => Ok((0..workers).map(Some).collect()),
        CoreMap::Allowed => {
            if workers == 0 {
                return Ok(Vec::new());
            }
            let allowed: Vec<usize> = affinity::allowed_cpus()
                .map_err(RunError::CoreDiscovery)?
                .iter()
                .collect();
            if allowed.is_empty() {
                return Err(RunError::CoreDiscovery(io::Error::new(
                    io::ErrorKind::NotFound,
                    "allowed CPU set is empty",
                )));
            }
            if allowed.len() < workers {
                eprintln!(
                    "WARN: {} workers but only {} allowed CPUs; cores will be shared",
                    workers,
                    allowed.len()
                );
            }
            Ok((0..workers).map(|i| Some(allowed[i % allowed.len()])).collect())
        }
    }
}

/// One participant's full protocol: pin, arrive, measure, publish, depart.
fn participate<K>(ctx: &RunCtx<'_, K>, id: usize, core: Option<usize>) -> Result<(), RunError>
where
    K: Fn(u64) -> KernelStats + Sync,
{
    let _tag = ParticipantGuard::enter(id);
    let _abort = AbortOnPanic(ctx.rendezvous);

    if let Some(core) = core {
        if let Err(source) = affinity::pin_current_thread_to_core(core) {
            ctx.rendezvous.abort();
            return Err(RunError::Affinity {
                participant: id,
                core,
                source,
            });
        }
    }

    ctx.rendezvous
        .arrive_and_wait()
        .map_err(|_| RunError::Aborted)?;

    let stats = (ctx.kernel)(ctx.working_set_bytes);
    let bandwidth = stats.bandwidth();
    if ctx.echo {
        println!("{}", participant_line(bandwidth));
    }

    ctx.slots.store(id, bandwidth);
    ctx.rendezvous.depart();
    Ok(())
}
