//! Start-gate ordering: nobody passes before everybody has arrived.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use cachebench::Rendezvous;

/// Per-participant arrival and release tickets from one global sequence.
fn run_tickets(n: usize) -> Vec<(u64, u64)> {
    let rv = Rendezvous::new(n);
    let seq = AtomicU64::new(0);
    thread::scope(|s| {
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
    })
}

#[test]
fn no_release_precedes_any_arrival() {
    for n in [1, 2, 3, 4, 8, 16] {
        let tickets = run_tickets(n);
        let last_arrival = tickets.iter().map(|t| t.0).max().unwrap();
        let first_release = tickets.iter().map(|t| t.1).min().unwrap();
        assert!(
            last_arrival < first_release,
            "n={n}: release {first_release} before arrival {last_arrival}"
        );
        // Arrivals take exactly the first n tickets.
        let mut arrivals: Vec<u64> = tickets.iter().map(|t| t.0).collect();
        arrivals.sort_unstable();
        assert_eq!(arrivals, (0..n as u64).collect::<Vec<_>>());
    }
}

#[test]
fn release_skew_is_small() {
    let n = thread::available_parallelism().map_or(2, |p| p.get()).clamp(2, 8);
    let rv = Rendezvous::new(n);
    let released: Vec<(Instant, Instant)> = thread::scope(|s| {
        let handles: Vec<_> = (0..n)
            .map(|_| {
                s.spawn(|| {
                    let arrived = Instant::now();
                    rv.arrive_and_wait().unwrap();
                    let passed = Instant::now();
                    rv.depart();
                    (arrived, passed)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let last_arrival = released.iter().map(|t| t.0).max().unwrap();
    let first_pass = released.iter().map(|t| t.1).min().unwrap();
    assert!(first_pass >= last_arrival);
    // Generous bound: even an oversubscribed CI box releases within this.
    let last_pass = released.iter().map(|t| t.1).max().unwrap();
    assert!(last_pass.duration_since(last_arrival) < Duration::from_secs(1));
}

#[test]
fn departures_return_counter_to_zero() {
    let n = 6;
    let rv = Rendezvous::new(n);
    thread::scope(|s| {
        for _ in 0..n - 1 {
            s.spawn(|| {
                rv.arrive_and_wait().unwrap();
                rv.depart();
            });
        }
        rv.arrive_and_wait().unwrap();
        rv.depart();
        rv.wait_all_departed().unwrap();
        assert_eq!(rv.count(), 0);
    });
}
