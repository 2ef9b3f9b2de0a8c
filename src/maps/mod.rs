//! CIDR map collaborator.
//!
//! # Data Flow
//! ```text
//! Reconciler
//!     → dump()              (observed set, fresh every pass)
//!     → update(cidr)        (for each CIDR to add)
//!     → delete(cidr)        (for each CIDR to remove)
//! ```
//!
//! # Design Decisions
//! - The map is the only authority on applied state; callers keep no copy
//! - Implementations synchronize internally and may be shared with other actors
//! - `update` of a present key and `delete` of an absent key are errors, so the
//!   reconciler must only issue operations justified by the latest dump

pub mod memory;
pub mod pinned;

use std::fmt;

use thiserror::Error;

use crate::net::Cidr;

pub use memory::MemoryCidrMap;
pub use pinned::PinnedCidrMap;

/// Errors returned by a [`CidrMap`].
#[derive(Debug, Error)]
pub enum MapError {
    #[error("CIDR already exists: {0}")]
    AlreadyExists(Cidr),

    #[error("CIDR not found: {0}")]
    NotFound(Cidr),

    /// The backing store cannot be reached at all.
    #[error("map unavailable: {0}")]
    Unavailable(String),

    #[error("map state IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid map state: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Mutating operation applied to a map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOp {
    Update,
    Delete,
}

impl MapOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapOp::Update => "update",
            MapOp::Delete => "delete",
        }
    }
}

impl fmt::Display for MapOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally synchronized set of CIDRs exempt from masquerading.
pub trait CidrMap: Send + Sync {
    /// Insert `cidr`. Fails with [`MapError::AlreadyExists`] if present.
    fn update(&self, cidr: Cidr) -> Result<(), MapError>;

    /// Remove `cidr`. Fails with [`MapError::NotFound`] if absent.
    fn delete(&self, cidr: Cidr) -> Result<(), MapError>;

    /// Complete current contents, in no particular order.
    fn dump(&self) -> Result<Vec<Cidr>, MapError>;
}
