//! Property tests for result aggregation and slot ownership.

use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use cachebench::participant::current_participant;
use cachebench::{run_with, HarnessConfig, KernelStats, ResultSlots, RunReport};

fn config(participants: usize) -> HarnessConfig {
    HarnessConfig {
        working_set_bytes: 0,
        participants: Some(participants),
        ..HarnessConfig::quick()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// With one-second kernels, bandwidth equals the reported byte count,
    /// so every slot and the total are exact.
    #[test]
    fn run_total_equals_sum_of_kernel_results(
        values in prop::collection::vec(0u32..=1_000_000, 1..=8)
    ) {
        let kernel = |_bytes: u64| {
            let id = current_participant().unwrap();
            KernelStats {
                bytes: u64::from(values[id]),
                elapsed: Duration::from_secs(1),
                cycles: None,
                elements_touched: 0,
            }
        };
        let report = run_with(&config(values.len()), &kernel).unwrap();

        let expected: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
        prop_assert_eq!(&report.per_participant, &expected);
        prop_assert_eq!(report.total_bandwidth(), expected.iter().sum::<f64>());
    }

    #[test]
    fn report_total_is_order_independent(
        mut values in prop::collection::vec(0.0f64..1e12, 0..=64)
    ) {
        let forward = RunReport::new(0, values.clone()).total_bandwidth();
        values.reverse();
        let backward = RunReport::new(0, values).total_bandwidth();
        prop_assert!((forward - backward).abs() <= forward.abs() * 1e-9 + 1e-6);
    }

    #[test]
    fn concurrent_slot_writes_are_never_lost(
        values in prop::collection::vec(-1e15f64..1e15, 1..=16)
    ) {
        let slots = ResultSlots::new(values.len());
        thread::scope(|s| {
            for (i, &v) in values.iter().enumerate() {
                let slots = &slots;
                s.spawn(move || slots.store(i, v));
            }
        });
        let snapshot = slots.snapshot();
        for (i, &v) in values.iter().enumerate() {
            prop_assert_eq!(snapshot[i], Some(v));
        }
    }
}
