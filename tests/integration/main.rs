//! Integration tests for the parallel bandwidth harness.
//!
//! Run with: `cargo test --test integration`

mod aggregation;
mod rendezvous_order;
