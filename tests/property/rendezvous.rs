//! Property tests for the start gate across participant counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use proptest::prelude::*;

use cachebench::Rendezvous;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_arrival_precedes_every_release(n in 1usize..=12) {
        let rv = Rendezvous::new(n);
        let seq = AtomicU64::new(0);
        let tickets: Vec<(u64, u64)> = thread::scope(|s| {
            let handles: Vec<_> = (0..n)
                .map(|_| {
                    s.spawn(|| {
                        let arrived = seq.fetch_add(1, Ordering::SeqCst);
                        rv.arrive_and_wait().unwrap();
                        let released = seq.fetch_add(1, Ordering::SeqCst);
                        rv.depart();
                        (arrived, released)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let last_arrival = tickets.iter().map(|t| t.0).max().unwrap();
        let first_release = tickets.iter().map(|t| t.1).min().unwrap();
        prop_assert!(last_arrival < first_release);
        prop_assert_eq!(rv.count(), 0);
    }
}
