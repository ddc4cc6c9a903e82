//! Topic names for readiness signals.
//!
//! A [`Topic`] is a validated, non-empty string. Static names are stored
//! borrowed, runtime names (`capabilities:user`, per-app topics) owned.
//!
//! `Topic` implements `Borrow<str>`, so broker lookups such as
//! [`Broker::is_published`](super::Broker::is_published) take a plain `&str`.

use std::{
    borrow::{Borrow, Cow},
    fmt,
};

use crate::error::{BrokerError, Result};

/// Name of a readiness signal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// Published once the user's settings have loaded.
    pub const SETTINGS: Topic = Topic(Cow::Borrowed("settings"));

    /// Published once the server-reported capability set is known.
    pub const CAPABILITIES: Topic = Topic(Cow::Borrowed("capabilities"));

    /// Creates a topic, rejecting empty or whitespace-only names.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BrokerError::InvalidTopic {
                topic: name.into_owned(),
            });
        }
        Ok(Self(name))
    }

    /// Derives a `parent:scope` topic, e.g. `capabilities:user`.
    ///
    /// ```rust
    /// use rusty_ready::Topic;
    ///
    /// let user = Topic::CAPABILITIES.scoped("user").unwrap();
    /// assert_eq!(user.as_str(), "capabilities:user");
    /// assert!(Topic::CAPABILITIES.scoped("").is_err());
    /// ```
    pub fn scoped(&self, scope: &str) -> Result<Self> {
        let name = format!("{}:{}", self.0, scope);
        if scope.trim().is_empty() {
            return Err(BrokerError::InvalidTopic { topic: name });
        }
        Ok(Self(Cow::Owned(name)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Conversion accepted by `publish`/`subscribe`.
///
/// Implemented for [`Topic`], `&Topic`, `&'static str` and `String`; string
/// forms are validated with [`Topic::new`].
pub trait IntoTopic {
    fn into_topic(self) -> Result<Topic>;
}

impl IntoTopic for Topic {
    fn into_topic(self) -> Result<Topic> {
        Ok(self)
    }
}

impl IntoTopic for &Topic {
    fn into_topic(self) -> Result<Topic> {
        Ok(self.clone())
    }
}

impl IntoTopic for &'static str {
    fn into_topic(self) -> Result<Topic> {
        Topic::new(self)
    }
}

impl IntoTopic for String {
    fn into_topic(self) -> Result<Topic> {
        Topic::new(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn new_accepts_static_and_owned() {
        let a = Topic::new("settings").unwrap();
        let b = Topic::new(String::from("settings")).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, Topic::SETTINGS);
    }

    #[test]
    fn new_rejects_blank_names() {
        assert_eq!(
            Topic::new(""),
            Err(BrokerError::InvalidTopic { topic: "".into() })
        );
        assert!(Topic::new(" \t").is_err());
    }

    #[test]
    fn scoped_joins_with_colon() {
        let topic = Topic::CAPABILITIES.scoped("drive").unwrap();

        assert_eq!(topic.to_string(), "capabilities:drive");
    }

    #[test]
    fn scoped_rejects_blank_scope() {
        let err = Topic::CAPABILITIES.scoped(" ").unwrap_err();

        assert_eq!(
            err,
            BrokerError::InvalidTopic {
                topic: "capabilities: ".into()
            }
        );
    }

    #[test]
    fn lookup_by_str_matches_owned_key() {
        let mut map = HashMap::new();
        map.insert(Topic::new(String::from("capabilities:user")).unwrap(), 1);

        assert_eq!(map.get("capabilities:user"), Some(&1));
        assert_eq!(map.get("capabilities"), None);
    }

    #[test]
    fn into_topic_validates_strings() {
        assert!("".into_topic().is_err());
        assert!(String::new().into_topic().is_err());
        assert_eq!((&Topic::SETTINGS).into_topic(), Ok(Topic::SETTINGS));
    }
}
