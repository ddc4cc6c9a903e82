//! Benchmark utilities for the readiness broker.
//!
//! - **Microbenchmarks**: single operations (queued subscribe, replay, drain)
//! - **Scenario benchmarks**: whole application boots with many topics and
//!   modules subscribing before and after publication, single- and
//!   multi-threaded
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_ready_bench
//!
//! # Run specific benchmark group
//! cargo bench -p rusty_ready_bench -- publish
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports.

pub mod payload;
pub mod scenarios;
