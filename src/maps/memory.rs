//! In-process CIDR map.

use std::sync::Arc;

use dashmap::DashSet;

use crate::maps::{CidrMap, MapError};
use crate::net::Cidr;

/// A thread-safe CIDR set with the same contract as the kernel map.
///
/// Cloning shares the underlying set.
#[derive(Clone, Default)]
pub struct MemoryCidrMap {
    inner: Arc<DashSet<Cidr>>,
}

impl MemoryCidrMap {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map pre-populated with `cidrs`.
    pub fn with_entries(cidrs: impl IntoIterator<Item = Cidr>) -> Self {
        let map = Self::new();
        for cidr in cidrs {
            map.inner.insert(cidr);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, cidr: &Cidr) -> bool {
        self.inner.contains(cidr)
    }
}

impl CidrMap for MemoryCidrMap {
    fn update(&self, cidr: Cidr) -> Result<(), MapError> {
        if self.inner.insert(cidr) {
            Ok(())
        } else {
            Err(MapError::AlreadyExists(cidr))
        }
    }

    fn delete(&self, cidr: Cidr) -> Result<(), MapError> {
        self.inner
            .remove(&cidr)
            .map(|_| ())
            .ok_or(MapError::NotFound(cidr))
    }

    fn dump(&self) -> Result<Vec<Cidr>, MapError> {
        Ok(self.inner.iter().map(|r| *r.key()).collect())
    }
}
