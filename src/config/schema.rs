//! Configuration schema definitions.
//!
//! Two documents are described here:
//! - [`ExemptionConfig`]: the operator-authored file listing CIDRs that skip
//!   masquerading. Accepted as YAML or JSON.
//! - [`AgentSettings`]: tuning knobs for the agent itself, read from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Field name shared by both accepted encodings.
pub const NON_MASQUERADE_CIDRS: &str = "nonMasqueradeCIDRs";

/// Raw exemption document as it appears on disk.
///
/// Entries are kept as text here; canonicalization happens in the loader so
/// a bad entry can be reported with its position.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExemptionConfig {
    /// CIDRs excluded from source NAT. `None` when the field is absent or null.
    #[serde(rename = "nonMasqueradeCIDRs", default)]
    pub non_masquerade_cidrs: Option<Vec<String>>,
}

/// Agent tuning, all fields defaulted so an empty file is valid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentSettings {
    /// Quiet period after the last file event before reconciling.
    pub debounce_ms: u64,

    /// Upper bound on how long a continuous burst can postpone a pass.
    pub max_debounce_ms: u64,

    /// Fingerprint poll interval (fallback when notifications are missed).
    pub poll_interval_ms: u64,

    /// Unconditional resync period, repairs out-of-band map edits.
    pub resync_interval_secs: u64,

    /// Base delay for retrying a pass that failed against the map.
    pub retry_base_ms: u64,

    /// Retry delay cap.
    pub retry_max_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            max_debounce_ms: 1_000,
            poll_interval_ms: 1_000,
            resync_interval_secs: 60,
            retry_base_ms: 200,
            retry_max_ms: 30_000,
        }
    }
}

impl AgentSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_debounce(&self) -> Duration {
        Duration::from_millis(self.max_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}
