use crate::error::{Error, ErrorKind};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A normalized SHA-1 digest of a track container, the universal identity key.
///
/// Parsed from (and displayed as) 40 hexadecimal characters. Parsing accepts
/// either case; display is always lowercase. Equality is byte-exact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; ContentHash::LEN]);

impl ContentHash {
    /// Digest length in bytes.
    pub const LEN: usize = 20;

    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lowercase hexadecimal representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ContentHash {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut bytes = [0u8; Self::LEN];
        if trimmed.len() != Self::LEN * 2 || hex::decode_to_slice(trimmed, &mut bytes).is_err() {
            exn::bail!(ErrorKind::InvalidHash(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<&str> for ContentHash {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_hex())
    }
}

// Derived Debug would print a byte array nobody can compare against wszst output.
impl Debug for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| D::Error::custom((*e).to_string()))
    }
}
