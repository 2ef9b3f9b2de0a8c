//! Resilience helpers.
//!
//! # Design Decisions
//! - Failed passes against the map are retried with exponential backoff
//! - Config decode failures are not retried; only a new write can fix them

pub mod backoff;

pub use backoff::RetryBackoff;
