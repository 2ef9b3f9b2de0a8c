//! Configuration loading from disk.
//!
//! The exemption file is decoded into a [`DesiredSet`]; the agent's own
//! settings come from an optional TOML file.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{AgentSettings, ExemptionConfig};
use crate::config::validation::{join_errors, validate_settings, ValidationError};
use crate::net::{Cidr, CidrError};

/// Canonical CIDRs declared by the current exemption file.
pub type DesiredSet = BTreeSet<Cidr>;

/// Exemption content that could not be turned into a desired set.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("config is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Neither encoding matched the schema.
    #[error("config matches neither YAML ({yaml}) nor JSON ({json})")]
    Format { yaml: String, json: String },

    /// A listed entry failed canonicalization. The whole file is rejected.
    #[error("entry #{index} ({entry:?}): {source}")]
    InvalidCidr {
        index: usize,
        entry: String,
        #[source]
        source: CidrError,
    },
}

/// Failure to obtain the desired set from the config path.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// Error type for loading the agent settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Decode exemption file bytes, trying YAML first and JSON second.
///
/// Empty or whitespace-only content yields an empty set.
pub fn parse_config(bytes: &[u8]) -> Result<DesiredSet, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    if text.trim().is_empty() {
        return Ok(DesiredSet::new());
    }

    let config: ExemptionConfig = match serde_yaml::from_str(text) {
        Ok(config) => config,
        Err(yaml_err) => serde_json::from_str(text).map_err(|json_err| DecodeError::Format {
            yaml: yaml_err.to_string(),
            json: json_err.to_string(),
        })?,
    };

    config
        .non_masquerade_cidrs
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            Cidr::canonicalize(entry).map_err(|source| DecodeError::InvalidCidr {
                index,
                entry: entry.clone(),
                source,
            })
        })
        .collect()
}

/// Read and decode the exemption file. A missing file means "no exemptions".
pub fn load_desired(path: &Path) -> Result<DesiredSet, SourceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = ?path, "Config file not found, no exemptions configured");
            return Ok(DesiredSet::new());
        }
        Err(source) => {
            return Err(SourceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parse_config(&bytes).map_err(|source| SourceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate agent settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<AgentSettings, SettingsError> {
    let content = fs::read_to_string(path)?;
    let settings: AgentSettings = toml::from_str(&content)?;

    validate_settings(&settings).map_err(SettingsError::Validation)?;

    Ok(settings)
}
