//! File-persisted CIDR map.
//!
//! Keeps the set in memory and rewrites a JSON state file after every
//! mutation, so the map outlives the agent process the way a pinned kernel
//! map does. A restarted agent opening the same file sees whatever the
//! previous instance left behind, stale entries included.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::maps::{CidrMap, MapError};
use crate::net::Cidr;

pub struct PinnedCidrMap {
    path: PathBuf,
    entries: Mutex<BTreeSet<Cidr>>,
}

impl PinnedCidrMap {
    /// Open the map at `path`, loading existing state if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MapError> {
        let path = path.into();
        let entries = match File::open(&path) {
            Ok(file) => {
                let entries: BTreeSet<Cidr> = serde_json::from_reader(BufReader::new(file))?;
                tracing::info!(path = ?path, entries = entries.len(), "Loaded pinned map state");
                entries
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = ?path, "No pinned map state, starting empty");
                BTreeSet::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<Cidr>> {
        // Entries are only mutated after a successful save, so a poisoned
        // guard still holds a consistent set.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomic write (temp file + rename).
    fn save(&self, entries: &BTreeSet<Cidr>) -> Result<(), MapError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            serde_json::to_writer_pretty(&mut writer, entries)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl CidrMap for PinnedCidrMap {
    fn update(&self, cidr: Cidr) -> Result<(), MapError> {
        let mut entries = self.lock();
        if entries.contains(&cidr) {
            return Err(MapError::AlreadyExists(cidr));
        }

        let mut next = entries.clone();
        next.insert(cidr);
        self.save(&next)?;
        *entries = next;
        Ok(())
    }

    fn delete(&self, cidr: Cidr) -> Result<(), MapError> {
        let mut entries = self.lock();
        if !entries.contains(&cidr) {
            return Err(MapError::NotFound(cidr));
        }

        let mut next = entries.clone();
        next.remove(&cidr);
        self.save(&next)?;
        *entries = next;
        Ok(())
    }

    fn dump(&self) -> Result<Vec<Cidr>, MapError> {
        Ok(self.lock().iter().copied().collect())
    }
}
