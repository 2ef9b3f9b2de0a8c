//! One read → parse → dump → diff → apply pass.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::loader::{load_desired, SourceError};
use crate::maps::{CidrMap, MapError, MapOp};
use crate::net::Cidr;
use crate::observability::metrics;
use crate::reconcile::diff::Diff;

/// A failure observed during a pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Config could not be read or decoded; the map was left untouched.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The map could not be dumped; the pass was aborted.
    #[error("failed to dump map: {0}")]
    Dump(#[source] MapError),

    /// A single entry could not be applied; the rest of the pass continued.
    #[error("failed to {op} {cidr}: {source}")]
    Apply {
        op: MapOp,
        cidr: Cidr,
        #[source]
        source: MapError,
    },
}

impl ReconcileError {
    /// Whether retrying without a config change can help.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ReconcileError::Source(SourceError::Decode { .. }))
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Map matches the config.
    Converged,
    /// Some entries failed to apply; the rest were applied.
    Partial,
    /// Nothing was applied (config or dump failure).
    Skipped,
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassOutcome::Converged => "converged",
            PassOutcome::Partial => "partial",
            PassOutcome::Skipped => "skipped",
        }
    }
}

/// Result of a single reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Size of the desired set, if the config was decoded.
    pub desired: Option<usize>,
    /// CIDRs successfully inserted.
    pub added: Vec<Cidr>,
    /// CIDRs successfully removed.
    pub removed: Vec<Cidr>,
    pub errors: Vec<ReconcileError>,
}

impl ReconcileReport {
    pub fn outcome(&self) -> PassOutcome {
        if self.errors.is_empty() {
            PassOutcome::Converged
        } else if self
            .errors
            .iter()
            .any(|e| matches!(e, ReconcileError::Source(_) | ReconcileError::Dump(_)))
        {
            PassOutcome::Skipped
        } else {
            PassOutcome::Partial
        }
    }

    /// Number of map operations that succeeded.
    pub fn applied(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    pub fn is_converged(&self) -> bool {
        self.outcome() == PassOutcome::Converged
    }

    /// A retry without a config change could make progress.
    pub fn should_retry(&self) -> bool {
        self.errors.iter().any(ReconcileError::is_transient)
    }

    fn skipped(error: ReconcileError) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }
}

/// Converges a [`CidrMap`] to the exemption file at `config_path`.
///
/// Holds no state between passes: the desired set is re-read and the
/// observed set re-dumped every time.
pub struct Reconciler {
    config_path: PathBuf,
    map: Arc<dyn CidrMap>,
}

impl Reconciler {
    pub fn new(config_path: impl Into<PathBuf>, map: Arc<dyn CidrMap>) -> Self {
        Self {
            config_path: config_path.into(),
            map,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn reconcile(&self) -> ReconcileReport {
        let report = self.run_pass();
        metrics::record_pass(report.outcome());
        report
    }

    fn run_pass(&self) -> ReconcileReport {
        let desired = match load_desired(&self.config_path) {
            Ok(desired) => desired,
            Err(e) => {
                if matches!(e, SourceError::Decode { .. }) {
                    metrics::record_decode_error();
                }
                tracing::error!(error = %e, "Invalid config, leaving map unchanged");
                return ReconcileReport::skipped(e.into());
            }
        };
        metrics::record_desired(desired.len());

        let observed: BTreeSet<Cidr> = match self.map.dump() {
            Ok(entries) => entries.into_iter().collect(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to dump map, aborting pass");
                return ReconcileReport::skipped(ReconcileError::Dump(e));
            }
        };

        let diff = Diff::between(&desired, &observed);
        let mut report = ReconcileReport {
            desired: Some(desired.len()),
            ..ReconcileReport::default()
        };

        if diff.is_empty() {
            tracing::debug!(entries = desired.len(), "Map already matches config");
            return report;
        }

        for cidr in diff.to_add {
            match self.apply(MapOp::Update, cidr) {
                Ok(()) => report.added.push(cidr),
                Err(e) => report.errors.push(e),
            }
        }
        for cidr in diff.to_remove {
            match self.apply(MapOp::Delete, cidr) {
                Ok(()) => report.removed.push(cidr),
                Err(e) => report.errors.push(e),
            }
        }

        tracing::info!(
            added = report.added.len(),
            removed = report.removed.len(),
            failed = report.errors.len(),
            desired = desired.len(),
            "Reconciled non-masquerade CIDRs"
        );
        report
    }

    fn apply(&self, op: MapOp, cidr: Cidr) -> Result<(), ReconcileError> {
        let result = match op {
            MapOp::Update => self.map.update(cidr),
            MapOp::Delete => self.map.delete(cidr),
        };
        metrics::record_map_op(op, result.is_ok());

        result.map_err(|source| {
            tracing::warn!(%op, %cidr, error = %source, "Map operation failed");
            ReconcileError::Apply { op, cidr, source }
        })
    }
}
