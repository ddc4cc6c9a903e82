//! Readiness brokers and their supporting types.
//!
//! - [`Broker`] single-threaded, shared as `Rc<Broker<P>>`
//! - [`SharedBroker`] `Send + Sync`, shared as `Arc<SharedBroker<P>>`
//! - [`Topic`] validated signal names
//! - [`Delivery`], [`Subscription`], [`BrokerStats`] call outcomes

pub mod broker;
pub(crate) mod delivery;
pub mod shared;
pub mod topic;

pub use broker::Broker;
pub use delivery::{BrokerStats, Delivery, Subscription};
pub use shared::SharedBroker;
pub use topic::{IntoTopic, Topic};
