//! Entity addresses.

use std::{fmt, str::FromStr};

use crate::errors::{ProtocolError, Result};

/// Address of a protocol entity (`local@domain/resource`).
///
/// Treated as opaque apart from the resource split: the bare form drops
/// everything from the first `/`. Equality is on the full string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid(String);

impl Jid {
    /// Parse an address, rejecting empty input and an empty domain.
    pub fn parse(address: &str) -> Result<Self> {
        if address.is_empty() {
            return Err(ProtocolError::InvalidAddress {
                address: address.to_string(),
                reason: "empty address",
            });
        }

        let bare = address.split('/').next().unwrap_or_default();
        let domain = bare.rsplit('@').next().unwrap_or_default();
        if domain.is_empty() {
            return Err(ProtocolError::InvalidAddress {
                address: address.to_string(),
                reason: "empty domain",
            });
        }

        Ok(Self(address.to_string()))
    }

    /// Full address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address without its resource part.
    pub fn bare(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// True when both addresses share the same bare form.
    pub fn bare_eq(&self, other: &Jid) -> bool {
        self.bare() == other.bare()
    }
}

impl FromStr for Jid {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Jid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
