//! Single-threaded boot scenario.
//!
//! A client boot with `topics` readiness topics and `subscribers` module
//! callbacks spread over them. Subscriptions and publications are interleaved
//! in a seeded random order, so roughly half of the callbacks are queued and
//! drained while the rest are replayed.

use std::{cell::Cell, rc::Rc};

use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use rusty_ready::{Broker, BrokerConfig, Topic};

use crate::payload::{SettingsPayload, capability_topics};
use crate::scenarios::Scenario;

/// Configuration for the boot benchmark.
pub struct BootConfig {
    /// Number of distinct readiness topics.
    pub topics: usize,
    /// Subscriber callbacks registered per boot.
    pub subscribers: usize,
    /// Keys in the published settings payload.
    pub payload_keys: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            topics: 16,
            subscribers: 1_000,
            payload_keys: 32,
            seed: 12345,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Subscribe(usize),
    Publish(usize),
}

pub struct BootScenario {
    config: BootConfig,
    topics: Vec<Topic>,
    steps: Vec<Step>,
    payload: SettingsPayload,
    delivered: usize,
}

impl BootScenario {
    pub fn new() -> Self {
        Self::with_config(BootConfig::default())
    }

    pub fn with_config(config: BootConfig) -> Self {
        Self {
            config,
            topics: Vec::new(),
            steps: Vec::new(),
            payload: SettingsPayload::default(),
            delivered: 0,
        }
    }

    /// Callbacks that received a payload during the last `update`.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Default for BootScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for BootScenario {
    fn name(&self) -> &'static str {
        "boot"
    }

    fn description(&self) -> &'static str {
        "Interleaved subscribe/publish over many topics, mixing queued delivery and replay"
    }

    fn subscriber_count(&self) -> usize {
        self.config.subscribers
    }

    fn setup(&mut self) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let topics = self.config.topics.max(1);

        self.topics = capability_topics(topics)
            .into_iter()
            .map(|name| Topic::new(name).expect("generated topic names are non-empty"))
            .collect();
        self.steps = (0..self.config.subscribers)
            .map(|_| Step::Subscribe(rng.gen_range(0..topics)))
            .chain((0..topics).map(Step::Publish))
            .collect();
        self.steps.shuffle(&mut rng);
        self.payload = SettingsPayload::with_keys(self.config.payload_keys);
    }

    fn update(&mut self) {
        // Pending lists for a boot of this size are expected to be large.
        let broker = Broker::with_config(BrokerConfig {
            pending_warn_threshold: 0,
            ..Default::default()
        });
        let delivered = Rc::new(Cell::new(0usize));

        for step in &self.steps {
            match *step {
                Step::Subscribe(topic) => {
                    let delivered = Rc::clone(&delivered);
                    let _ = broker.subscribe(&self.topics[topic], move |p: &SettingsPayload| {
                        delivered.set(delivered.get() + usize::from(!p.language.is_empty()));
                    });
                }
                Step::Publish(topic) => {
                    let _ = broker.publish(&self.topics[topic], self.payload.clone());
                }
            }
        }
        self.delivered = delivered.get();
    }

    fn teardown(&mut self) {
        self.steps.clear();
        self.topics.clear();
    }
}
