//! Publish-once, replay-forever readiness signals.
//!
//! Application startup is a race: settings load, the server reports
//! capabilities, and UI modules that depend on both are loaded in whatever
//! order the network delivers them. A readiness broker removes the race.
//! Each signal ("settings", "capabilities:user", ...) is published once; a
//! module that subscribes before publication is queued, a module that
//! subscribes after is answered immediately with the stored payload.
//!
//! ```rust
//! use rusty_ready::{Broker, Subscription};
//!
//! let broker: Broker<&str> = Broker::new();
//!
//! let queued = broker.subscribe("capabilities:drive", |_| {}).unwrap();
//! assert_eq!(queued, Subscription::Queued { position: 0 });
//!
//! let delivery = broker.publish("capabilities:drive", "enabled").unwrap();
//! assert_eq!(delivery.delivered, 1);
//!
//! let replayed = broker.subscribe("capabilities:drive", |state| assert_eq!(*state, "enabled")).unwrap();
//! assert!(replayed.is_replayed());
//! ```
//!
//! See [`event::broker`] for the per-topic state machine and the re-entrancy
//! rules, and [`SharedBroker`] for multi-threaded hosts.

pub mod config;
pub mod error;
pub mod event;

pub use config::BrokerConfig;
pub use error::{BrokerError, Result, SubscriberFailure};
pub use event::{Broker, BrokerStats, Delivery, IntoTopic, SharedBroker, Subscription, Topic};
