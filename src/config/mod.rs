//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! exemption file (YAML or JSON)
//!     → loader.rs (decode, canonicalize every entry)
//!     → DesiredSet (rebuilt on every pass)
//!
//! On change:
//!     watcher.rs detects write / truncate / removal
//!     → debounce window closes
//!     → reconciler re-reads the file
//!
//! agent settings (TOML, optional)
//!     → loader.rs → validation.rs → AgentSettings
//! ```
//!
//! # Design Decisions
//! - A missing exemption file means "no exemptions", not an error
//! - One bad entry rejects the whole file; no partial desired sets
//! - Settings have defaults for every field to allow minimal configs

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_desired, load_settings, parse_config, DecodeError, DesiredSet, SettingsError, SourceError};
pub use schema::{AgentSettings, ExemptionConfig};
pub use watcher::{ChangeTrigger, ConfigWatcher, WatchError};
