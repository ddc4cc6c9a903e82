//! Thread-safe readiness broker.
//!
//! [`SharedBroker`] keeps the [`Broker`](super::Broker) contract for hosts
//! where publishers and subscribers live on different threads. Per-topic
//! state lives in a [`DashMap`]; each `publish`/`subscribe` makes its state
//! change while holding the topic's shard lock and runs callbacks only after
//! releasing it.
//!
//! ```text
//!   thread A: subscribe(t, cb) ─┐                ┌─► record present ─► cb(&p) (unlocked)
//!                               ├─► shard lock ──┤
//!   thread B: publish(t, p) ────┘                └─► record = p, take pending ─► drain (unlocked)
//! ```
//!
//! Because the record write and the queue drain are one locked step, a
//! subscriber racing a publication either lands in the queue before the drain
//! or sees the record and is replayed. No callback is lost or run twice.

use std::{
    fmt, mem,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use dashmap::DashMap;
use log::{debug, info, warn};

use crate::{
    config::BrokerConfig,
    error::Result,
    event::{BrokerStats, Delivery, IntoTopic, Subscription, Topic, delivery::invoke},
};

type Callback<P> = Box<dyn FnOnce(&P) + Send + Sync>;

struct Slot<P> {
    pending: Vec<Callback<P>>,
    record: Option<Arc<P>>,
}

impl<P> Default for Slot<P> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            record: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    publications: AtomicUsize,
    queued_deliveries: AtomicUsize,
    replays: AtomicUsize,
    failures: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            publications: self.publications.load(Ordering::Relaxed),
            queued_deliveries: self.queued_deliveries.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// `Send + Sync` readiness broker; share it as `Arc<SharedBroker<P>>`.
///
/// Ordering guarantees match [`Broker`](super::Broker): FIFO per topic, no
/// ordering across topics. Callbacks may call back into the broker.
pub struct SharedBroker<P: Send + Sync + 'static> {
    config: BrokerConfig,
    slots: DashMap<Topic, Slot<P>>,
    stats: Counters,
}

impl<P: Send + Sync + 'static> SharedBroker<P> {
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        Self {
            config,
            slots: DashMap::new(),
            stats: Counters::default(),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Publishes `payload` on `topic`. See [`Broker::publish`](super::Broker::publish).
    pub fn publish(&self, topic: impl IntoTopic, payload: P) -> Result<Delivery> {
        let topic = topic.into_topic()?;
        let payload = Arc::new(payload);

        let (pending, republished) = {
            let mut slot = self.slots.entry(topic.clone()).or_default();
            let republished = slot.record.replace(Arc::clone(&payload)).is_some();
            (mem::take(&mut slot.pending), republished)
        };

        if republished {
            debug!(
                "topic '{topic}' republished; {} callback(s) queued since last publication",
                pending.len()
            );
        } else {
            info!("topic '{topic}' is ready; delivering to {} subscriber(s)", pending.len());
        }

        let mut delivery = Delivery::new(topic, republished);
        for (index, callback) in pending.into_iter().enumerate() {
            let outcome = invoke(&delivery.topic, index, callback, payload.as_ref());
            delivery.record(outcome);
        }

        self.stats.publications.fetch_add(1, Ordering::Relaxed);
        self.stats
            .queued_deliveries
            .fetch_add(delivery.invoked(), Ordering::Relaxed);
        self.stats
            .failures
            .fetch_add(delivery.failures.len(), Ordering::Relaxed);
        Ok(delivery)
    }

    /// Subscribes `callback` to `topic`. See [`Broker::subscribe`](super::Broker::subscribe).
    pub fn subscribe<F>(&self, topic: impl IntoTopic, callback: F) -> Result<Subscription>
    where
        F: FnOnce(&P) + Send + Sync + 'static,
    {
        let topic = topic.into_topic()?;

        let payload = {
            let mut slot = self.slots.entry(topic.clone()).or_default();
            match slot.record.as_ref().map(Arc::clone) {
                Some(payload) => payload,
                None => {
                    slot.pending.push(Box::new(callback));
                    let len = slot.pending.len();
                    debug!("queued subscriber #{} on '{topic}'", len - 1);
                    if self.config.crosses_pending_threshold(len) {
                        warn!("topic '{topic}' has {len} pending subscribers and has not been published");
                    }
                    return Ok(Subscription::Queued { position: len - 1 });
                }
            }
        };

        debug!("replaying '{topic}' to late subscriber");
        let failure = invoke(&topic, 0, callback, payload.as_ref()).err();
        self.stats.replays.fetch_add(1, Ordering::Relaxed);
        if failure.is_some() {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Subscription::Replayed { failure })
    }

    /// Subscribes to the configured ready topic.
    pub fn ready<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnOnce(&P) + Send + Sync + 'static,
    {
        self.subscribe(&self.config.ready_topic, callback)
    }

    /// Publishes on the configured ready topic.
    pub fn publish_ready(&self, payload: P) -> Result<Delivery> {
        self.publish(&self.config.ready_topic, payload)
    }

    pub fn is_published(&self, topic: &str) -> bool {
        self.slots
            .get(topic)
            .is_some_and(|slot| slot.record.is_some())
    }

    pub fn payload(&self, topic: &str) -> Option<Arc<P>> {
        self.slots.get(topic)?.record.clone()
    }

    pub fn pending(&self, topic: &str) -> usize {
        self.slots.get(topic).map_or(0, |slot| slot.pending.len())
    }

    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.slots.iter().map(|e| e.key().clone()).collect();
        topics.sort();
        topics
    }

    pub fn unresolved(&self) -> Vec<(Topic, usize)> {
        let mut unresolved: Vec<_> = self
            .slots
            .iter()
            .filter(|e| e.record.is_none() && !e.pending.is_empty())
            .map(|e| (e.key().clone(), e.pending.len()))
            .collect();
        unresolved.sort();
        unresolved
    }

    pub fn stats(&self) -> BrokerStats {
        self.stats.snapshot()
    }
}

impl<P: Send + Sync + 'static> Default for SharedBroker<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send + Sync + 'static> fmt::Debug for SharedBroker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBroker")
            .field("config", &self.config)
            .field("topics", &self.topics())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crossbeam::channel;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Capabilities(Vec<&'static str>);

    fn caps() -> Capabilities {
        Capabilities(vec!["mail", "calendar"])
    }

    // ==================== Contract ====================

    #[test]
    fn queued_then_replayed() {
        // Given
        let broker = SharedBroker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let early = Arc::clone(&seen);
        let sub = broker
            .subscribe("capabilities", move |c: &Capabilities| {
                early.lock().unwrap().push(("early", c.0.len()))
            })
            .unwrap();
        assert_eq!(sub, Subscription::Queued { position: 0 });

        // When
        let delivery = broker.publish("capabilities", caps()).unwrap();
        let late = Arc::clone(&seen);
        let sub = broker
            .subscribe("capabilities", move |c: &Capabilities| {
                late.lock().unwrap().push(("late", c.0.len()))
            })
            .unwrap();

        // Then
        assert_eq!(delivery.delivered, 1);
        assert!(sub.is_replayed());
        assert_eq!(*seen.lock().unwrap(), [("early", 2), ("late", 2)]);
    }

    #[test]
    fn fifo_and_topic_isolation() {
        let broker = SharedBroker::new();
        let (tx, rx) = channel::unbounded();
        for id in 0..5 {
            let tx = tx.clone();
            broker
                .subscribe("settings", move |_: &Capabilities| tx.send(id).unwrap())
                .unwrap();
        }
        let other = tx.clone();
        broker
            .subscribe("capabilities", move |_: &Capabilities| other.send(99).unwrap())
            .unwrap();

        broker.publish("settings", caps()).unwrap();

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
        assert_eq!(broker.pending("capabilities"), 1);
    }

    #[test]
    fn republish_keeps_drained_callbacks_quiet() {
        let broker = SharedBroker::new();
        let (tx, rx) = channel::unbounded();
        broker
            .subscribe("settings", move |c: &Capabilities| tx.send(c.0.len()).unwrap())
            .unwrap();

        broker.publish("settings", caps()).unwrap();
        let again = broker.publish("settings", Capabilities(vec![])).unwrap();

        assert!(again.republished);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [2]);
        assert_eq!(broker.payload("settings").as_deref(), Some(&Capabilities(vec![])));
    }

    #[test]
    fn panic_is_isolated() {
        let broker = SharedBroker::new();
        let (tx, rx) = channel::unbounded();
        broker
            .subscribe("settings", |_: &Capabilities| panic!("first"))
            .unwrap();
        broker
            .subscribe("settings", move |_: &Capabilities| tx.send("second").unwrap())
            .unwrap();

        let delivery = broker.publish("settings", caps()).unwrap();

        assert_eq!(delivery.failures.len(), 1);
        assert_eq!(delivery.failures[0].message, "first");
        assert_eq!(rx.try_recv(), Ok("second"));
        assert_eq!(broker.stats().failures, 1);
    }

    #[test]
    fn callback_may_reenter_same_topic() {
        let broker = Arc::new(SharedBroker::new());
        let (tx, rx) = channel::unbounded();

        let inner = Arc::clone(&broker);
        broker
            .subscribe("settings", move |_: &Capabilities| {
                let sub = inner
                    .subscribe("settings", move |c: &Capabilities| tx.send(c.0.len()).unwrap())
                    .unwrap();
                assert!(sub.is_replayed());
            })
            .unwrap();
        broker.publish("settings", caps()).unwrap();

        assert_eq!(rx.try_recv(), Ok(2));
    }

    #[test]
    fn ready_uses_settings_topic() {
        let broker = SharedBroker::new();
        let (tx, rx) = channel::unbounded();
        broker
            .ready(move |c: &Capabilities| tx.send(c.clone()).unwrap())
            .unwrap();

        broker.publish_ready(caps()).unwrap();

        assert_eq!(rx.try_recv(), Ok(caps()));
        assert!(broker.is_published("settings"));
        assert!(broker.unresolved().is_empty());
    }

    // ==================== Concurrency ====================

    #[test]
    fn racing_subscribers_each_fire_exactly_once() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let broker = SharedBroker::<Capabilities>::new();
        let fired = Arc::new(AtomicUsize::new(0));

        crossbeam::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|_| {
                    for _ in 0..PER_THREAD {
                        let fired = Arc::clone(&fired);
                        broker
                            .subscribe("settings", move |_: &Capabilities| {
                                fired.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                });
            }
            s.spawn(|_| {
                broker.publish("settings", caps()).unwrap();
            });
        })
        .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), THREADS * PER_THREAD);
        assert_eq!(broker.pending("settings"), 0);
        let stats = broker.stats();
        assert_eq!(stats.queued_deliveries + stats.replays, THREADS * PER_THREAD);
    }

    #[test]
    fn shared_broker_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedBroker<Capabilities>>();
    }
}
