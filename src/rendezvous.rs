//! Lock-free counting rendezvous for aligned start and finish detection.
//!
//! # Protocol
//!
//! One counter serves both phases of a run:
//!
//! ```text
//! start:   arrive_and_wait()   count: 0 -> N, gate opens at N
//! kernel:  (timed work)
//! finish:  depart()            count: N -> 0
//!          wait_all_departed() returns once count == 0
//! ```
//!
//! Increments and decrements never overlap: no participant departs before
//! the gate opens, and the gate opens only once all N have incremented.
//!
//! # Latched gate
//!
//! Waiters poll a separate `open` flag rather than `count == N`. A fast
//! participant may finish its kernel and decrement before a slow one
//! observes the full count; polling the count alone would strand the slow
//! one forever.
//!
//! # Memory ordering
//!
//! - The last arrival stores `open` with `Release`; waiters load it with
//!   `Acquire`, so every participant's pre-arrival setup happens-before any
//!   participant's kernel start.
//! - `depart` decrements with `Release`; `wait_all_departed` loads with
//!   `Acquire`, so every result-slot write happens-before the harness reads.
//!
//! # Waiting
//!
//! All waits spin with `std::hint::spin_loop()` (`PAUSE` on x86). Nothing
//! sleeps or yields: wake-up skew is bounded by cache-coherence latency,
//! not by the OS scheduler.
//!
//! # Abort
//!
//! `abort()` releases every current and future waiter with `Err(Aborted)`.
//! Setup failures (pinning, spawn) and participant panics use it so that no
//! thread is left spinning on a count that can never be reached.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Returned by a wait on an aborted rendezvous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aborted;

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rendezvous aborted")
    }
}

impl std::error::Error for Aborted {}

/// Two-phase counting rendezvous shared by all participants of one run.
#[derive(Debug)]
pub struct Rendezvous {
    count: CachePadded<AtomicUsize>,
    open: CachePadded<AtomicBool>,
    aborted: CachePadded<AtomicBool>,
    participants: usize,
}

impl Rendezvous {
    /// Creates a rendezvous for exactly `participants` threads.
    ///
    /// # Panics
    ///
    /// Panics if `participants == 0`.
    pub fn new(participants: usize) -> Self {
        assert!(participants > 0, "rendezvous needs at least one participant");
        Self {
            count: CachePadded::new(AtomicUsize::new(0)),
            open: CachePadded::new(AtomicBool::new(false)),
            aborted: CachePadded::new(AtomicBool::new(false)),
            participants,
        }
    }

    #[inline]
    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Current counter value (arrivals minus departures).
    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether every participant has arrived.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Start phase: registers this participant and spins until all arrive.
    ///
    /// Each participant must call this exactly once per run.
    pub fn arrive_and_wait(&self) -> Result<(), Aborted> {
        let before = self.count.fetch_add(1, Ordering::AcqRel);
        debug_assert!(before < self.participants, "too many arrivals");
        if before + 1 == self.participants {
            self.open.store(true, Ordering::Release);
            return self.check_aborted();
        }

        while !self.open.load(Ordering::Acquire) {
            if self.aborted.load(Ordering::Acquire) {
                return Err(Aborted);
            }
            std::hint::spin_loop();
        }
        self.check_aborted()
    }

    /// Finish phase: signals that this participant's result is published.
    #[inline]
    pub fn depart(&self) {
        let before = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(before > 0, "depart without matching arrival");
    }

    /// Spins until every participant has departed.
    pub fn wait_all_departed(&self) -> Result<(), Aborted> {
        while self.count.load(Ordering::Acquire) != 0 {
            if self.aborted.load(Ordering::Acquire) {
                return Err(Aborted);
            }
            std::hint::spin_loop();
        }
        Ok(())
    }

    /// Releases all waiters with `Err(Aborted)`. Idempotent.
    #[inline]
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    #[inline]
    fn check_aborted(&self) -> Result<(), Aborted> {
        if self.is_aborted() {
            Err(Aborted)
        } else {
            Ok(())
        }
    }
}
