//! Multi-threaded scenario for [`SharedBroker`].
//!
//! Subscriber threads register callbacks on a handful of topics while a
//! publisher thread publishes each topic once, so subscriptions race the
//! shard lock against publication.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use rusty_ready::{BrokerConfig, SharedBroker, Topic};

use crate::payload::{SettingsPayload, capability_topics};
use crate::scenarios::Scenario;

pub struct ContentionConfig {
    pub threads: usize,
    pub subscribers_per_thread: usize,
    pub topics: usize,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            subscribers_per_thread: 500,
            topics: 8,
        }
    }
}

pub struct ContentionScenario {
    config: ContentionConfig,
    topics: Vec<Topic>,
    payload: Arc<SettingsPayload>,
    delivered: usize,
}

impl ContentionScenario {
    pub fn new() -> Self {
        Self::with_config(ContentionConfig::default())
    }

    pub fn with_config(config: ContentionConfig) -> Self {
        Self {
            config,
            topics: Vec::new(),
            payload: Arc::new(SettingsPayload::default()),
            delivered: 0,
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Default for ContentionScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for ContentionScenario {
    fn name(&self) -> &'static str {
        "contention"
    }

    fn description(&self) -> &'static str {
        "Subscriber threads racing one publisher on the thread-safe broker"
    }

    fn subscriber_count(&self) -> usize {
        self.config.threads * self.config.subscribers_per_thread
    }

    fn setup(&mut self) {
        self.topics = capability_topics(self.config.topics.max(1))
            .into_iter()
            .map(|name| Topic::new(name).expect("generated topic names are non-empty"))
            .collect();
        self.payload = Arc::new(SettingsPayload::with_keys(8));
    }

    fn update(&mut self) {
        let broker = SharedBroker::<Arc<SettingsPayload>>::with_config(BrokerConfig {
            pending_warn_threshold: 0,
            ..Default::default()
        });
        let delivered = Arc::new(AtomicUsize::new(0));
        let topics = &self.topics;
        let payload = &self.payload;
        let per_thread = self.config.subscribers_per_thread;

        crossbeam::scope(|s| {
            for thread in 0..self.config.threads {
                let broker = &broker;
                let delivered = &delivered;
                s.spawn(move |_| {
                    for i in 0..per_thread {
                        let delivered = Arc::clone(delivered);
                        let topic = &topics[(thread + i) % topics.len()];
                        let _ = broker.subscribe(topic, move |_: &Arc<SettingsPayload>| {
                            delivered.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                });
            }
            s.spawn(|_| {
                for topic in topics {
                    let _ = broker.publish(topic, Arc::clone(payload));
                }
            });
        })
        .expect("scenario threads do not panic");

        self.delivered = delivered.load(Ordering::Relaxed);
    }

    fn teardown(&mut self) {
        self.topics.clear();
    }
}
