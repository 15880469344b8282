//! Thread-local participant ID.
//!
//! The harness tags each participant thread (spawned workers and the harness
//! thread itself) with its slot index for the duration of a run. Kernels and
//! log lines can call [`current_participant`] to attribute work without the
//! index being threaded through the `(size) -> stats` contract.
//!
//! # Correctness Invariant
//!
//! `current_participant()` returns `Some(id)` only while a run is executing
//! on that thread. The harness clears the ID before the participant returns,
//! including on panic, via [`ParticipantGuard`].

use std::cell::Cell;

/// Sentinel value indicating no participant ID is set.
const NO_PARTICIPANT: usize = usize::MAX;

thread_local! {
    static PARTICIPANT_ID: Cell<usize> = const { Cell::new(NO_PARTICIPANT) };
}

/// Sets (or clears, with `None`) the current thread's participant ID.
#[inline]
pub(crate) fn set_current_participant(id: Option<usize>) {
    PARTICIPANT_ID.with(|c| c.set(id.unwrap_or(NO_PARTICIPANT)));
}

/// Participant ID of the current thread, if it is inside a run.
#[inline]
pub fn current_participant() -> Option<usize> {
    PARTICIPANT_ID.with(|c| {
        let v = c.get();
        if v == NO_PARTICIPANT {
            None
        } else {
            Some(v)
        }
    })
}

/// Scoped participant tag; restores the previous ID on drop.
#[derive(Debug)]
pub struct ParticipantGuard {
    prev: Option<usize>,
}

impl ParticipantGuard {
    pub fn enter(id: usize) -> Self {
        let prev = current_participant();
        set_current_participant(Some(id));
        Self { prev }
    }
}

impl Drop for ParticipantGuard {
    fn drop(&mut self) {
        set_current_participant(self.prev);
    }
}
