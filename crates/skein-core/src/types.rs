//! Identifiers and key handles shared by every component.
//!
//! All of these are plain values: equality is by value, they carry no mutable
//! state, and they are cheap to copy or clone.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable per-user identity handle (a 128-bit service id).
///
/// Two recipients are the same user iff their ids are equal. Use
/// [`Recipient::redacted`] when logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Recipient(u128);

impl Recipient {
    /// Wrap a raw service id.
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    /// Raw service id.
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Log-safe rendering that only exposes the trailing three hex digits.
    pub fn redacted(self) -> String {
        format!("***{:03x}", self.0 & 0xfff)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Device number of one of a user's linked devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// The primary device of an account.
    pub const PRIMARY: Self = Self(1);
}

/// A single device of a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolAddress {
    /// Owning user.
    pub recipient: Recipient,
    /// Device of that user.
    pub device_id: DeviceId,
}

impl ProtocolAddress {
    /// Address of `device_id` belonging to `recipient`.
    pub const fn new(recipient: Recipient, device_id: DeviceId) -> Self {
        Self { recipient, device_id }
    }
}

/// The sending account: who we are and which device is sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Our own recipient handle.
    pub recipient: Recipient,
    /// The device this process runs as.
    pub device_id: DeviceId,
}

impl LocalIdentity {
    /// Identity for `recipient` sending from `device_id`.
    pub const fn new(recipient: Recipient, device_id: DeviceId) -> Self {
        Self { recipient, device_id }
    }

    /// Protocol address of the sending device.
    pub const fn address(&self) -> ProtocolAddress {
        ProtocolAddress::new(self.recipient, self.device_id)
    }
}

/// 32-byte group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub [u8; 32]);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Identifies the sender-key distribution group of one group chat.
///
/// One active id per group, created lazily on the first sender-key send and
/// kept until the group state is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistributionId(pub u128);

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Anonymous-access (unidentified delivery) token for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessToken(pub [u8; 16]);

/// Serialized public identity key of a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(pub Vec<u8>);

/// Trust assigned to an identity key when it is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Key is recorded but messages to it are refused until verified.
    Untrusted,
    /// Key is accepted without out-of-band verification.
    TrustedUnverified,
    /// Key was verified out of band (safety number comparison).
    TrustedVerified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_recipient_hides_all_but_last_three_digits() {
        let recipient = Recipient::new(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        assert_eq!(recipient.redacted(), "***ef0");
        assert!(!recipient.redacted().contains("1234"));
    }

    #[test]
    fn recipient_display_is_full_width_hex() {
        assert_eq!(Recipient::new(0xab).to_string(), format!("{:032x}", 0xab));
    }

    #[test]
    fn group_id_display_is_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xde;
        bytes[31] = 0x01;
        let rendered = GroupId(bytes).to_string();
        assert_eq!(rendered.len(), 64);
        assert!(rendered.starts_with("de00"));
        assert!(rendered.ends_with("01"));
    }

    #[test]
    fn local_identity_address_uses_sending_device() {
        let me = LocalIdentity::new(Recipient::new(7), DeviceId(3));
        assert_eq!(me.address(), ProtocolAddress::new(Recipient::new(7), DeviceId(3)));
    }
}
