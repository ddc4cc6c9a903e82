//! Single-threaded readiness broker.
//!
//! [`Broker`] sequences application startup: modules that load at
//! unpredictable times subscribe to readiness topics ("settings",
//! "capabilities:user", ...) and every one of them receives the topic's
//! payload exactly once, whether it subscribed before or after the topic
//! was published.
//!
//! # State per topic
//!
//! ```text
//!                 subscribe(cb)                    subscribe(cb)
//!                ┌───────────┐                    ┌───────────┐
//!                │  enqueue  │                    │ replay now│
//!                ▼           │                    ▼           │
//!          ┌─────────────────┴─┐  publish(p)  ┌───────────────┴─┐
//!   ──────►│   unpublished     │─────────────►│    published    │◄──┐
//!          │ pending: [cb, ..] │ drain FIFO,  │ record: p       │   │ publish(p')
//!          └───────────────────┘ clear queue  └─────────────────┴───┘ record = p'
//! ```
//!
//! The published state is one-way. A later publication only replaces the
//! record seen by later subscribers; callbacks that already received a payload
//! are never invoked again.
//!
//! # Re-entrancy
//!
//! All methods take `&self`, so callbacks may publish or subscribe on the same
//! broker. The record is written before the drained callbacks run, which means
//! a callback that subscribes to the topic currently being published is
//! replayed immediately rather than parked in a queue nothing will drain.
//!
//! # Example
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//! use rusty_ready::Broker;
//!
//! let broker = Broker::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let early = Rc::clone(&log);
//! broker.ready(move |lang: &String| early.borrow_mut().push(format!("early:{lang}"))).unwrap();
//!
//! broker.publish("settings", "en".to_string()).unwrap();
//!
//! let late = Rc::clone(&log);
//! broker.ready(move |lang: &String| late.borrow_mut().push(format!("late:{lang}"))).unwrap();
//!
//! assert_eq!(*log.borrow(), ["early:en", "late:en"]);
//! ```

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt, mem,
    rc::Rc,
};

use log::{debug, info, warn};

use crate::{
    config::BrokerConfig,
    error::Result,
    event::{
        BrokerStats, Delivery, IntoTopic, Subscription, Topic,
        delivery::invoke,
    },
};

type Callback<P> = Box<dyn FnOnce(&P)>;

/// Per-topic state: callbacks waiting for the first publication and the
/// last published payload.
struct Slot<P> {
    pending: Vec<Callback<P>>,
    record: Option<Rc<P>>,
}

impl<P> Default for Slot<P> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            record: None,
        }
    }
}

/// Publish-once, replay-forever notification hub for one application session.
///
/// Construct one at the application root and share it (usually as
/// `Rc<Broker<P>>`) with the modules that publish or wait on readiness
/// signals. For multi-threaded hosts use [`SharedBroker`](super::SharedBroker).
///
/// # Thread Safety
///
/// `Broker` is neither `Send` nor `Sync`. Each call completes its state change
/// (queue drain, record write) before any callback runs, so callbacks always
/// observe a consistent broker.
pub struct Broker<P: 'static> {
    config: BrokerConfig,
    slots: RefCell<HashMap<Topic, Slot<P>>>,
    stats: Cell<BrokerStats>,
}

impl<P: 'static> Broker<P> {
    /// Creates an empty broker with the default [`BrokerConfig`].
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Creates an empty broker with the given configuration.
    pub fn with_config(config: BrokerConfig) -> Self {
        Self {
            config,
            slots: RefCell::new(HashMap::new()),
            stats: Cell::new(BrokerStats::default()),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Publishes `payload` on `topic`.
    ///
    /// Every callback queued for `topic` is invoked once, in registration
    /// order, with `&payload`; the queue is then empty. The payload becomes
    /// the topic's record (last write wins) and is replayed to every later
    /// subscriber.
    ///
    /// A panicking callback is isolated: the panic is logged, reported in
    /// [`Delivery::failures`], and the remaining callbacks still run.
    ///
    /// # Errors
    ///
    /// [`BrokerError::InvalidTopic`](crate::BrokerError::InvalidTopic) if
    /// `topic` is an empty name. Nothing is delivered in that case.
    pub fn publish(&self, topic: impl IntoTopic, payload: P) -> Result<Delivery> {
        let topic = topic.into_topic()?;
        let payload = Rc::new(payload);

        let (pending, republished) = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(topic.clone()).or_default();
            let republished = slot.record.replace(Rc::clone(&payload)).is_some();
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

        self.update_stats(|stats| {
            stats.publications += 1;
            stats.queued_deliveries += delivery.invoked();
            stats.failures += delivery.failures.len();
        });
        Ok(delivery)
    }

    /// Subscribes `callback` to `topic`.
    ///
    /// - Published topic: `callback` runs now with the stored payload, before
    ///   this call returns, and is not queued.
    /// - Unpublished topic: `callback` is queued and runs exactly once at the
    ///   next `publish` of `topic`.
    ///
    /// Callbacks cannot be withdrawn once registered.
    ///
    /// # Errors
    ///
    /// [`BrokerError::InvalidTopic`](crate::BrokerError::InvalidTopic) if
    /// `topic` is an empty name; `callback` is dropped without running.
    pub fn subscribe<F>(&self, topic: impl IntoTopic, callback: F) -> Result<Subscription>
    where
        F: FnOnce(&P) + 'static,
    {
        let topic = topic.into_topic()?;

        let payload = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(topic.clone()).or_default();
            match &slot.record {
                Some(payload) => Rc::clone(payload),
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
        self.update_stats(|stats| {
            stats.replays += 1;
            stats.failures += usize::from(failure.is_some());
        });
        Ok(Subscription::Replayed { failure })
    }

    /// Subscribes to the configured ready topic ("settings" by default).
    pub fn ready<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnOnce(&P) + 'static,
    {
        self.subscribe(&self.config.ready_topic, callback)
    }

    /// Publishes on the configured ready topic.
    pub fn publish_ready(&self, payload: P) -> Result<Delivery> {
        self.publish(&self.config.ready_topic, payload)
    }

    /// True once `topic` has been published.
    pub fn is_published(&self, topic: &str) -> bool {
        self.slots
            .borrow()
            .get(topic)
            .is_some_and(|slot| slot.record.is_some())
    }

    /// The last payload published on `topic`, if any.
    pub fn payload(&self, topic: &str) -> Option<Rc<P>> {
        self.slots.borrow().get(topic)?.record.clone()
    }

    /// Number of callbacks waiting on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.slots
            .borrow()
            .get(topic)
            .map_or(0, |slot| slot.pending.len())
    }

    /// Every topic the broker has seen, sorted by name.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.slots.borrow().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Unpublished topics that still hold callbacks, with their queue length.
    pub fn unresolved(&self) -> Vec<(Topic, usize)> {
        let mut unresolved: Vec<_> = self
            .slots
            .borrow()
            .iter()
            .filter(|(_, slot)| slot.record.is_none() && !slot.pending.is_empty())
            .map(|(topic, slot)| (topic.clone(), slot.pending.len()))
            .collect();
        unresolved.sort();
        unresolved
    }

    pub fn stats(&self) -> BrokerStats {
        self.stats.get()
    }

    fn update_stats(&self, f: impl FnOnce(&mut BrokerStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl<P: 'static> Default for Broker<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> fmt::Debug for Broker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("topics", &self.topics())
            .field("stats", &self.stats.get())
            .finish()
    }
}
