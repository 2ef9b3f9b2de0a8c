//! Network value types.
//!
//! # Data Flow
//! ```text
//! "2.2.2.2/16" (operator text)
//!     → cidr.rs (parse, mask host bits)
//!     → Cidr 2.2.0.0/16 (canonical, usable as a set key)
//! ```
//!
//! # Design Decisions
//! - Canonical form is enforced at construction; no un-masked `Cidr` exists
//! - Both address families are accepted; the map decides what it stores

pub mod cidr;

pub use cidr::{Cidr, CidrError};
