//! Broker configuration.

use crate::event::Topic;

/// Settings shared by [`Broker`](crate::Broker) and [`SharedBroker`](crate::SharedBroker).
///
/// ```rust
/// use rusty_ready::{Broker, BrokerConfig, Topic};
///
/// let mut cfg = BrokerConfig::default();
/// cfg.pending_warn_threshold = 0;
/// cfg.ready_topic = Topic::new("boot").unwrap();
///
/// let broker: Broker<u32> = Broker::with_config(cfg);
/// assert_eq!(broker.config().ready_topic.as_str(), "boot");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Topic that `ready()` subscribes to. Default: [`Topic::SETTINGS`].
    pub ready_topic: Topic,

    /// A `warn` is logged when a topic's pending list reaches this length.
    ///
    /// Pending callbacks are held until their topic is published, so a topic
    /// that never fires keeps them alive for the life of the broker. `0`
    /// disables the warning. Default: 64.
    pub pending_warn_threshold: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            ready_topic: Topic::SETTINGS,
            pending_warn_threshold: 64,
        }
    }
}

impl BrokerConfig {
    /// True if `len` pending callbacks is exactly the warning threshold.
    pub(crate) fn crosses_pending_threshold(&self, len: usize) -> bool {
        self.pending_warn_threshold > 0 && len == self.pending_warn_threshold
    }
}
