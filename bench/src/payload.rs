//! Payload types used across benchmarks.
//!
//! Sized like what a client publishes at boot: a settings tree with a few
//! dozen keys, and a capability list.

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct SettingsPayload {
    pub language: String,
    pub values: BTreeMap<String, String>,
}

impl SettingsPayload {
    /// Settings with `keys` entries named `key.0 .. key.N`.
    pub fn with_keys(keys: usize) -> Self {
        Self {
            language: "en_US".into(),
            values: (0..keys)
                .map(|i| (format!("key.{i}"), format!("value {i}")))
                .collect(),
        }
    }
}

/// Topic names `capabilities:cap0 .. capabilities:capN`.
pub fn capability_topics(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("capabilities:cap{i}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_keys_builds_requested_size() {
        let settings = SettingsPayload::with_keys(3);

        assert_eq!(settings.values.len(), 3);
        assert_eq!(settings.values["key.2"], "value 2");
    }

    #[test]
    fn capability_topics_are_scoped() {
        assert_eq!(
            capability_topics(2),
            ["capabilities:cap0", "capabilities:cap1"]
        );
    }
}
