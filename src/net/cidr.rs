//! Canonical CIDR value type.
//!
//! A [`Cidr`] always holds its network form: every bit past the prefix
//! length is cleared on construction, so `2.2.2.2/16` and `2.2.0.0/16`
//! compare, hash and print identically.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced while canonicalizing a textual CIDR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    /// Input has no `/prefix` part.
    #[error("missing prefix length in {0:?}")]
    MissingPrefix(String),

    /// Address or prefix could not be parsed, or the prefix is too long
    /// for the address family.
    #[error("invalid CIDR {0:?}")]
    Invalid(String),
}

/// A network address plus prefix length, host bits zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cidr(IpNet);

impl Cidr {
    /// Parse `<address>/<prefix>` and mask off the host bits.
    pub fn canonicalize(text: &str) -> Result<Self, CidrError> {
        let text = text.trim();
        if !text.contains('/') {
            return Err(CidrError::MissingPrefix(text.to_string()));
        }
        let net: IpNet = text
            .parse()
            .map_err(|_| CidrError::Invalid(text.to_string()))?;
        Ok(Self(net.trunc()))
    }

    /// Network address (host bits cleared).
    pub fn network(&self) -> IpAddr {
        self.0.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.0, IpNet::V4(_))
    }

    /// Underlying `ipnet` representation.
    pub fn as_ipnet(&self) -> &IpNet {
        &self.0
    }
}

impl From<IpNet> for Cidr {
    fn from(net: IpNet) -> Self {
        Self(net.trunc())
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::canonicalize(s)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.network(), self.0.prefix_len())
    }
}

// Serialized as the canonical string so state files stay human-readable.
impl Serialize for Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::canonicalize(&text).map_err(serde::de::Error::custom)
    }
}
