//! Whole-boot benchmark scenarios.
//!
//! # Scenarios
//!
//! - **Boot**: many topics, subscribers registered before and after their
//!   topic is published, in a seeded random order
//! - **Contention**: the thread-safe broker with subscriber threads racing a
//!   publisher

pub mod boot;
pub mod contention;

pub use boot::{BootConfig, BootScenario};
pub use contention::{ContentionConfig, ContentionScenario};

/// Common trait for benchmark scenarios.
pub trait Scenario {
    /// Human-readable name of the scenario.
    fn name(&self) -> &'static str;

    /// Brief description of what this scenario tests.
    fn description(&self) -> &'static str;

    /// Number of subscriber callbacks registered per run.
    fn subscriber_count(&self) -> usize;

    /// Set up the scenario (build the plan, payloads).
    fn setup(&mut self);

    /// Run one boot against a fresh broker.
    fn update(&mut self);

    /// Clean up the scenario.
    fn teardown(&mut self);
}
