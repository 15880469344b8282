//! End-to-end runs with mocked kernels: totals and slot ownership.

use std::time::Duration;

use cachebench::participant::current_participant;
use cachebench::{run, run_with, HarnessConfig, Kernel, KernelStats, RunError};

fn config(participants: usize) -> HarnessConfig {
    HarnessConfig {
        working_set_bytes: 1_000,
        participants: Some(participants),
        ..HarnessConfig::quick()
    }
}

/// Kernel whose bandwidth is `(participant + 1) * 1000` B/s.
fn by_participant(bytes: u64) -> KernelStats {
    let id = current_participant().expect("kernel runs inside a participant");
    KernelStats {
        bytes,
        elapsed: Duration::from_secs_f64(1.0 / (id + 1) as f64),
        cycles: None,
        elements_touched: 0,
    }
}

#[test]
fn total_is_sum_of_mocked_bandwidths() {
    for n in [1, 2, 3, 8] {
        let report = run_with(&config(n), &by_participant).unwrap();
        let expected: f64 = (0..n).map(|i| ((i + 1) * 1000) as f64).sum();
        assert_eq!(report.participants(), n);
        let total = report.total_bandwidth();
        assert!(
            (total - expected).abs() <= expected * 1e-6,
            "n={n}: total {total} != {expected}"
        );
    }
}

#[test]
fn every_slot_holds_its_own_participant_value() {
    let n = 12;
    let report = run_with(&config(n), &by_participant).unwrap();
    for (i, bw) in report.per_participant.iter().enumerate() {
        let expected = ((i + 1) * 1000) as f64;
        assert!(
            (bw - expected).abs() <= expected * 1e-6,
            "slot {i} holds {bw}, expected {expected}"
        );
    }
}

#[test]
fn kernel_sees_configured_working_set() {
    let kernel = |bytes: u64| {
        assert_eq!(bytes, 4096);
        KernelStats {
            bytes,
            elapsed: Duration::from_secs(1),
            cycles: None,
            elements_touched: 0,
        }
    };
    let cfg = HarnessConfig {
        working_set_bytes: 4096,
        ..config(3)
    };
    let report = run_with(&cfg, &kernel).unwrap();
    assert_eq!(report.working_set_bytes, 4096);
    assert_eq!(report.total_bandwidth(), 3.0 * 4096.0);
}

#[test]
fn real_read_kernel_reports_positive_total() {
    let cfg = HarnessConfig {
        working_set_bytes: 64 * 1024,
        ..config(2)
    };
    let report = run(&cfg, Kernel::SequentialRead).unwrap();
    assert_eq!(report.participants(), 2);
    assert!(report.per_participant.iter().all(|bw| *bw > 0.0));
    assert!(report.total_gbps() > 0.0);
    assert!(report.to_string().starts_with("Total bandwidth: "));
}

#[test]
fn panicking_kernel_fails_the_run() {
    let kernel = |bytes: u64| {
        if current_participant() == Some(1) {
            panic!("simulated fault");
        }
        by_participant(bytes)
    };
    let err = run_with(&config(4), &kernel).unwrap_err();
    assert!(
        matches!(err, RunError::ParticipantPanicked { participant: 1 }),
        "got {err:?}"
    );
}
