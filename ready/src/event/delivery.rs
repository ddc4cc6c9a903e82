//! Delivery reports and panic-isolated callback invocation.
//!
//! Every callback the brokers run goes through [`invoke`], which catches a
//! panic, logs it, and turns it into a [`SubscriberFailure`]. A failing
//! subscriber therefore never stops delivery to the subscribers queued after it.
//!
//! ```text
//! publish(topic, payload)
//!   ├─► cb #0 ── ok ─────────────► delivered += 1
//!   ├─► cb #1 ── panic ─► caught ─► failures.push(#1)
//!   └─► cb #2 ── ok ─────────────► delivered += 1
//! ```

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use log::error;

use crate::{error::SubscriberFailure, event::Topic};

/// Outcome of one `publish` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Topic that was published.
    pub topic: Topic,
    /// Number of queued callbacks that ran to completion.
    pub delivered: usize,
    /// Queued callbacks that panicked, in registration order.
    pub failures: Vec<SubscriberFailure>,
    /// True if the topic already held a record before this call.
    pub republished: bool,
}

impl Delivery {
    pub(crate) fn new(topic: Topic, republished: bool) -> Self {
        Self {
            topic,
            delivered: 0,
            failures: Vec::new(),
            republished,
        }
    }

    pub(crate) fn record(&mut self, outcome: Result<(), SubscriberFailure>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(failure) => self.failures.push(failure),
        }
    }

    /// Total callbacks drained by this publication.
    pub fn invoked(&self) -> usize {
        self.delivered + self.failures.len()
    }

    /// True if no drained callback panicked.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of one `subscribe` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// The topic is unpublished; the callback waits at `position` in its queue.
    Queued { position: usize },
    /// The topic was already published; the callback ran before `subscribe` returned.
    Replayed { failure: Option<SubscriberFailure> },
}

impl Subscription {
    #[inline]
    pub fn is_replayed(&self) -> bool {
        matches!(self, Subscription::Replayed { .. })
    }
}

/// Running totals kept by a broker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    /// `publish` calls, including re-publications.
    pub publications: usize,
    /// Queued callbacks run by a publication (panicked ones included).
    pub queued_deliveries: usize,
    /// Callbacks run immediately by `subscribe` (panicked ones included).
    pub replays: usize,
    /// Callbacks that panicked, on either path.
    pub failures: usize,
}

/// Runs `callback(payload)`, converting a panic into a [`SubscriberFailure`].
pub(crate) fn invoke<P, F>(
    topic: &Topic,
    index: usize,
    callback: F,
    payload: &P,
) -> Result<(), SubscriberFailure>
where
    P: ?Sized,
    F: FnOnce(&P),
{
    panic::catch_unwind(AssertUnwindSafe(|| callback(payload))).map_err(|panic| {
        let failure = SubscriberFailure {
            topic: topic.clone(),
            index,
            message: panic_message(panic.as_ref()),
        };
        error!("{failure}");
        failure
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_passes_payload() {
        let mut seen = None;

        let outcome = invoke(&Topic::SETTINGS, 0, |p: &u32| seen = Some(*p), &7);

        assert!(outcome.is_ok());
        assert_eq!(seen, Some(7));
    }

    #[test]
    fn invoke_catches_str_panic() {
        let outcome = invoke(&Topic::SETTINGS, 3, |_: &u32| panic!("bad settings"), &1);

        assert_eq!(
            outcome,
            Err(SubscriberFailure {
                topic: Topic::SETTINGS,
                index: 3,
                message: "bad settings".into(),
            })
        );
    }

    #[test]
    fn invoke_catches_formatted_panic() {
        let outcome = invoke(&Topic::CAPABILITIES, 0, |v: &u32| panic!("value {v}"), &9);

        assert_eq!(outcome.unwrap_err().message, "value 9");
    }

    #[test]
    fn invoke_reports_opaque_panic_payload() {
        let outcome = invoke(
            &Topic::SETTINGS,
            0,
            |_: &u32| std::panic::panic_any(42_u8),
            &1,
        );

        assert_eq!(outcome.unwrap_err().message, "<non-string panic payload>");
    }

    #[test]
    fn delivery_counts_outcomes() {
        let mut delivery = Delivery::new(Topic::SETTINGS, false);

        delivery.record(Ok(()));
        delivery.record(Err(SubscriberFailure {
            topic: Topic::SETTINGS,
            index: 1,
            message: "x".into(),
        }));
        delivery.record(Ok(()));

        assert_eq!(delivery.delivered, 2);
        assert_eq!(delivery.invoked(), 3);
        assert!(!delivery.is_clean());
    }
}
