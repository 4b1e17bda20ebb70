//! Dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{message::ContentHint, types::TrustLevel};

/// Default maximum age of a sender key before it is rotated.
pub const DEFAULT_SENDER_KEY_MAX_AGE_DAYS: u64 = 14;

const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Configuration for [`crate::GroupSender`].
///
/// Missing fields take their defaults, so a daemon config can carry a partial
/// `[dispatch]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Rotate our sender key once it is older than this many days.
    pub sender_key_max_age_days: u64,
    /// Trust assigned to identity keys learned while sending.
    pub new_key_trust_level: TrustLevel,
    /// Content hint for sender-key multicasts.
    pub content_hint: ContentHint,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sender_key_max_age_days: DEFAULT_SENDER_KEY_MAX_AGE_DAYS,
            new_key_trust_level: TrustLevel::TrustedUnverified,
            content_hint: ContentHint::Default,
        }
    }
}

impl DispatchConfig {
    /// Maximum key age as a duration.
    pub fn max_key_age(&self) -> Duration {
        Duration::from_millis(self.sender_key_max_age_days.saturating_mul(MILLIS_PER_DAY))
    }

    /// Reject configurations the policy cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sender_key_max_age_days == 0 {
            return Err(ConfigError::InvalidMaxKeyAge(self.sender_key_max_age_days));
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A zero max age would rotate on every send.
    #[error("sender key max age must be at least one day, got {0}")]
    InvalidMaxKeyAge(u64),
}

#[cfg(test)]
mod tests {
    use ciborium::Value;

    use super::*;

    fn decode(entries: Vec<(&str, Value)>) -> Result<DispatchConfig, String> {
        let table = Value::Map(
            entries.into_iter().map(|(key, value)| (Value::Text(key.into()), value)).collect(),
        );
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&table, &mut encoded).expect("serialization failed");
        ciborium::de::from_reader(&encoded[..]).map_err(|e| e.to_string())
    }

    #[test]
    fn defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.sender_key_max_age_days, 14);
        assert_eq!(config.new_key_trust_level, TrustLevel::TrustedUnverified);
        assert_eq!(config.content_hint, ContentHint::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn max_key_age_is_days_in_millis() {
        let config = DispatchConfig { sender_key_max_age_days: 2, ..DispatchConfig::default() };
        assert_eq!(config.max_key_age(), Duration::from_millis(2 * 86_400_000));
    }

    #[test]
    fn zero_max_age_is_rejected() {
        let config = DispatchConfig { sender_key_max_age_days: 0, ..DispatchConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxKeyAge(0)));
    }

    #[test]
    fn empty_table_decodes_to_defaults() {
        assert_eq!(decode(Vec::new()).unwrap(), DispatchConfig::default());
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config = decode(vec![
            ("sender_key_max_age_days", Value::Integer(30u64.into())),
            ("content_hint", Value::Text("resendable".into())),
        ])
        .unwrap();

        assert_eq!(config.sender_key_max_age_days, 30);
        assert_eq!(config.content_hint, ContentHint::Resendable);
        assert_eq!(config.new_key_trust_level, TrustLevel::TrustedUnverified);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = decode(vec![("rotate_every_send", Value::Bool(true))]).unwrap_err();
        assert!(err.contains("rotate_every_send"), "unexpected error: {err}");
    }

    #[test]
    fn config_survives_cbor_round_trip() {
        let original = DispatchConfig {
            sender_key_max_age_days: 7,
            new_key_trust_level: TrustLevel::Untrusted,
            content_hint: ContentHint::Implicit,
        };

        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&original, &mut encoded).expect("serialization failed");
        let decoded: DispatchConfig =
            ciborium::de::from_reader(&encoded[..]).expect("deserialization failed");

        assert_eq!(decoded, original);
    }
}
