//! IP masquerade exemption agent.
//!
//! Keeps a CIDR map (consulted by the node's SNAT fast path) converged to
//! the `nonMasqueradeCIDRs` list in a config file.

pub mod config;
pub mod lifecycle;
pub mod maps;
pub mod net;
pub mod observability;
pub mod reconcile;
pub mod resilience;

pub use config::AgentSettings;
pub use lifecycle::{Agent, AgentError, AgentState};
pub use maps::{CidrMap, MapError, MemoryCidrMap, PinnedCidrMap};
pub use net::Cidr;
pub use reconcile::{ReconcileReport, Reconciler};
