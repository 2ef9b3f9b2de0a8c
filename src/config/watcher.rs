//! Exemption file watcher.
//!
//! Two detectors feed one debounce timer:
//! - filesystem notifications on the file's parent directory, which keep
//!   working across delete and re-create
//! - a periodic content fingerprint poll, which covers missed or unavailable
//!   notifications
//!
//! The watcher also wakes up for periodic resyncs and for retries scheduled
//! by the caller after a failed pass.

use std::collections::hash_map::DefaultHasher;
use std::ffi::OsString;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::config::schema::AgentSettings;

/// Non-fatal change detection failure.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to stat {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why the watcher woke up the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTrigger {
    /// File content changed (or was created).
    Modified,
    /// File no longer exists.
    Removed,
    /// Periodic resync interval elapsed.
    Resync,
    /// Retry of a pass that failed against the map.
    Retry,
}

impl ChangeTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTrigger::Modified => "modified",
            ChangeTrigger::Removed => "removed",
            ChangeTrigger::Resync => "resync",
            ChangeTrigger::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fingerprint {
    Missing,
    Present(u64),
}

/// Hash of the file content. The read runs on the blocking pool.
async fn fingerprint(path: &Path) -> Result<Fingerprint, WatchError> {
    match fs::read(path).await {
        Ok(bytes) => {
            let mut hasher = DefaultHasher::new();
            bytes.hash(&mut hasher);
            Ok(Fingerprint::Present(hasher.finish()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Fingerprint::Missing),
        Err(source) => Err(WatchError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Pending debounce window.
#[derive(Debug, Clone, Copy)]
struct Burst {
    deadline: Instant,
    cap: Instant,
}

impl Burst {
    fn fire_at(&self) -> Instant {
        self.deadline.min(self.cap)
    }
}

enum Wake {
    Activity,
    Poll,
    Resync,
    Retry,
    Settled,
}

/// Watches the exemption file and yields debounced [`ChangeTrigger`]s.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    max_debounce: Duration,
    events: mpsc::UnboundedReceiver<()>,
    // Dropping it ends notifications.
    _fs_watcher: Option<RecommendedWatcher>,
    baseline: Option<Fingerprint>,
    poll: Interval,
    resync: Interval,
    retry_at: Option<Instant>,
}

impl ConfigWatcher {
    /// Start observing `path`. The current content becomes the baseline.
    ///
    /// When notifications cannot be set up (for example the parent directory
    /// does not exist yet) the watcher relies on the fingerprint poll alone.
    pub async fn new(path: &Path, settings: &AgentSettings) -> Self {
        let (tx, events) = mpsc::unbounded_channel();

        let fs_watcher = match watch_parent(path, tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "File notifications unavailable, relying on polling");
                None
            }
        };

        let baseline = match fingerprint(path).await {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::warn!(error = %e, "Could not fingerprint config");
                None
            }
        };

        tracing::info!(path = ?path, "Config watcher started");

        Self {
            path: path.to_path_buf(),
            debounce: settings.debounce(),
            max_debounce: settings.max_debounce(),
            events,
            _fs_watcher: fs_watcher,
            baseline,
            poll: delayed_interval(settings.poll_interval()),
            resync: delayed_interval(settings.resync_interval()),
            retry_at: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wake up with [`ChangeTrigger::Retry`] after `delay`, unless a file
    /// change fires first.
    pub fn schedule_retry(&mut self, delay: Duration) {
        self.retry_at = Some(Instant::now() + delay);
    }

    pub fn clear_retry(&mut self) {
        self.retry_at = None;
    }

    /// Wait for the next trigger.
    ///
    /// File activity is debounced: each event pushes the deadline out by the
    /// debounce period, bounded by `max_debounce` from the first event.
    /// Cancel-safe apart from discarding a pending burst.
    pub async fn changed(&mut self) -> ChangeTrigger {
        let mut burst: Option<Burst> = None;

        loop {
            let fire_at = burst.map(|b| b.fire_at());
            let retry_at = self.retry_at;

            let wake = tokio::select! {
                Some(()) = self.events.recv() => Wake::Activity,
                _ = self.poll.tick() => Wake::Poll,
                _ = self.resync.tick(), if burst.is_none() => Wake::Resync,
                _ = time::sleep_until(retry_at.unwrap_or_else(Instant::now)),
                    if retry_at.is_some() && burst.is_none() => Wake::Retry,
                _ = time::sleep_until(fire_at.unwrap_or_else(Instant::now)),
                    if fire_at.is_some() => Wake::Settled,
            };

            match wake {
                Wake::Activity => self.extend(&mut burst),
                Wake::Poll => {
                    if self.refresh_baseline().await {
                        tracing::debug!(path = ?self.path, "Config fingerprint changed");
                        self.extend(&mut burst);
                    }
                }
                Wake::Resync => return ChangeTrigger::Resync,
                Wake::Retry => {
                    self.retry_at = None;
                    return ChangeTrigger::Retry;
                }
                Wake::Settled => {
                    self.refresh_baseline().await;
                    return match self.baseline {
                        Some(Fingerprint::Missing) => ChangeTrigger::Removed,
                        _ => ChangeTrigger::Modified,
                    };
                }
            }
        }
    }

    fn extend(&self, burst: &mut Option<Burst>) {
        let now = Instant::now();
        match burst {
            Some(b) => b.deadline = now + self.debounce,
            None => {
                *burst = Some(Burst {
                    deadline: now + self.debounce,
                    cap: now + self.max_debounce,
                })
            }
        }
    }

    /// Re-read the fingerprint, returning whether it moved.
    async fn refresh_baseline(&mut self) -> bool {
        match fingerprint(&self.path).await {
            Ok(current) => {
                let changed = self.baseline != Some(current);
                self.baseline = Some(current);
                changed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config poll failed, will retry");
                false
            }
        }
    }
}

fn delayed_interval(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Watch the parent directory and forward events naming `path`.
fn watch_parent(path: &Path, tx: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher, WatchError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name: Option<OsString> = path.file_name().map(OsString::from);
    let notify_err = |source| WatchError::Notify {
        path: dir.clone(),
        source,
    };

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_access() {
                    return;
                }
                let relevant = event.paths.is_empty()
                    || event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                if relevant {
                    let _ = tx.send(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "Config watch error"),
        },
        Config::default(),
    )
    .map_err(notify_err)?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(notify_err)?;

    Ok(watcher)
}
