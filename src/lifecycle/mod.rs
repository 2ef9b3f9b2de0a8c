//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (agent.rs):
//!     Baseline config fingerprint → Restore pass (fresh dump) → Spawn watcher task
//!
//! Watcher task:
//!     Debounced change / resync / retry → Reconcile pass → Schedule retry if needed
//!
//! Stop (agent.rs, shutdown.rs):
//!     Trigger Shutdown → Await in-flight pass → Task exits (map untouched)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop the agent
//! ```
//!
//! # Design Decisions
//! - Passes are serialized: restore finishes before the watcher task exists,
//!   and the task runs one pass at a time
//! - Stop never clears the map; its contents outlive the process
//! - Restarting always restores from a fresh dump, never from memory

pub mod agent;
pub mod shutdown;
pub mod signals;

pub use agent::{Agent, AgentError, AgentState};
pub use shutdown::Shutdown;
