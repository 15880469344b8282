//! Property-based tests for aggregation and slot ownership.
//!
//! Run with: `cargo test --test property`

mod aggregation;
mod rendezvous;
