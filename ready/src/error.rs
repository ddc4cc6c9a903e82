//! Error types for the readiness broker.
//!
//! - [`BrokerError`] is returned from broker calls made with bad arguments.
//! - [`SubscriberFailure`] is *reported*, never returned as an `Err`: a
//!   panicking subscriber is isolated and the failure is handed back inside a
//!   [`Delivery`](crate::Delivery) or [`Subscription`](crate::Subscription).

use thiserror::Error;

use crate::event::Topic;

/// Crate-wide result alias.
pub type Result<T, E = BrokerError> = std::result::Result<T, E>;

/// Errors produced by broker calls.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The topic name was empty or contained only whitespace.
    #[error("invalid topic {topic:?}: topic names must not be empty")]
    InvalidTopic {
        /// The rejected name.
        topic: String,
    },
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use rusty_ready::Topic;
    ///
    /// let err = Topic::new("").unwrap_err();
    /// assert_eq!(err.as_label(), "broker_invalid_topic");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::InvalidTopic { .. } => "broker_invalid_topic",
        }
    }
}

/// A subscriber callback panicked while receiving a payload.
///
/// `index` is the callback's position in the batch being delivered: its
/// registration order for a drained publication, `0` for a replay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("subscriber #{index} on '{topic}' panicked: {message}")]
pub struct SubscriberFailure {
    /// Topic whose payload was being delivered.
    pub topic: Topic,
    /// Position of the callback within its delivery batch.
    pub index: usize,
    /// Panic message, when the panic payload was a string.
    pub message: String,
}

impl SubscriberFailure {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        "subscriber_panicked"
    }
}
