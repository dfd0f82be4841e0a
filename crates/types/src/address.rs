use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors raised when decoding an account or validator address.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with '{ADDRESS_PREFIX}'")]
    InvalidPrefix,
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Raw width of an address.
pub const ADDRESS_BYTES: usize = 20;
/// Human readable prefix of every encoded address.
pub const ADDRESS_PREFIX: &str = "sf";
/// Length of an encoded address (prefix + 40 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = ADDRESS_PREFIX.len() + ADDRESS_BYTES * 2;

/// Account identifier shared by delegators, validator operators and module accounts.
///
/// Ordered by raw bytes, which is also the order used in store keys, so
/// iteration over any address-keyed collection is deterministic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

/// Validators are addressed by their operator account.
pub type ValidatorAddress = Address;
/// Delegators are plain accounts.
pub type DelegatorAddress = Address;

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Derives a stable address from a label; used for module accounts and fixtures.
    pub fn derive(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_BYTES]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_BYTES] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ADDRESS_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::InvalidPrefix)?;
        if s.len() != ADDRESS_STRING_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_STRING_LENGTH,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; ADDRESS_BYTES];
        hex::decode_to_slice(payload, &mut bytes)?;
        Ok(Address(bytes))
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let address = Address::new([0xAB; ADDRESS_BYTES]);
        let encoded = address.to_string();
        assert!(encoded.starts_with(ADDRESS_PREFIX));
        assert_eq!(encoded.len(), ADDRESS_STRING_LENGTH);
        assert_eq!(encoded.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn derive_is_stable_and_distinct() {
        assert_eq!(Address::derive("alice"), Address::derive("alice"));
        assert_ne!(Address::derive("alice"), Address::derive("bob"));
    }

    #[test]
    fn invalid_prefix_rejected() {
        let bad = format!("xx{}", "00".repeat(ADDRESS_BYTES));
        assert_eq!(bad.parse::<Address>(), Err(AddressError::InvalidPrefix));
    }

    #[test]
    fn invalid_length_rejected() {
        let bad = format!("{ADDRESS_PREFIX}{}", "00".repeat(ADDRESS_BYTES - 1));
        assert!(matches!(
            bad.parse::<Address>(),
            Err(AddressError::InvalidLength { .. })
        ));
    }

    #[test]
    fn invalid_hex_rejected() {
        let bad = format!("{ADDRESS_PREFIX}{}", "gg".repeat(ADDRESS_BYTES));
        assert_eq!(
            bad.parse::<Address>(),
            Err(AddressError::InvalidHex(hex::FromHexError::InvalidHexCharacter {
                c: 'g',
                index: 0
            }))
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let address = Address::derive("validator-1");
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{address}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
