//! Reconciliation engine.
//!
//! # Data Flow
//! ```text
//! config file ──→ config::loader ──→ DesiredSet ─┐
//!                                                ├─→ diff.rs ─→ update/delete
//! CidrMap::dump() ─────────────────→ ObservedSet ┘
//! ```
//!
//! # Design Decisions
//! - Both sets are rebuilt every pass; nothing survives between passes
//! - A config that fails to decode skips the pass instead of clearing the map
//! - A dump failure aborts the pass before any diff is computed
//! - Per-entry failures are collected, the remaining entries still apply

pub mod diff;
pub mod reconciler;

pub use diff::Diff;
pub use reconciler::{PassOutcome, ReconcileError, ReconcileReport, Reconciler};
