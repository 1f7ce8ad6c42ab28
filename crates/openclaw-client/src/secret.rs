//! Gateway auth token that is wiped from memory on drop.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bearer token presented in the `connect` handshake.
///
/// Debug and Display output are redacted so configs can be logged safely.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct AuthToken {
    inner: String,
}

impl AuthToken {
    /// Wrap a token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// The raw token. Only the handshake should need this.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Whether no token was configured.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inner.is_empty() {
            f.write_str("AuthToken(<empty>)")
        } else {
            f.write_str("AuthToken([REDACTED])")
        }
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for AuthToken {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.inner.as_bytes())
    }
}

impl Eq for AuthToken {}

impl From<String> for AuthToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for AuthToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for AuthToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AuthToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
