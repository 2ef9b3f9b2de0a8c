//! Agent state machine: Created → Running → Stopped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::schema::AgentSettings;
use crate::config::validation::{join_errors, validate_settings, ValidationError};
use crate::config::watcher::ConfigWatcher;
use crate::maps::CidrMap;
use crate::observability::metrics;
use crate::lifecycle::shutdown::Shutdown;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::resilience::RetryBackoff;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent is already running")]
    AlreadyRunning,

    #[error("invalid agent settings: {}", join_errors(.0))]
    InvalidSettings(Vec<ValidationError>),

    #[error("reconciliation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Created => "created",
            AgentState::Running => "running",
            AgentState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

struct RunningWatcher {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

/// Keeps the CIDR map converged to the exemption file.
///
/// `start` runs a restore pass against a fresh dump before it returns, then
/// hands off to a background watcher task. `stop` ends that task and leaves
/// the map exactly as the last pass left it.
pub struct Agent {
    config_path: PathBuf,
    map: Arc<dyn CidrMap>,
    settings: AgentSettings,
    state: AgentState,
    watcher: Option<RunningWatcher>,
    last_report: Arc<ArcSwapOption<ReconcileReport>>,
}

impl Agent {
    /// Create an agent. Performs no I/O.
    pub fn new(config_path: impl Into<PathBuf>, map: Arc<dyn CidrMap>, settings: AgentSettings) -> Self {
        Self {
            config_path: config_path.into(),
            map,
            settings,
            state: AgentState::Created,
            watcher: None,
            last_report: Arc::new(ArcSwapOption::empty()),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Report of the most recent pass, from either `start` or the watcher.
    pub fn last_report(&self) -> Option<Arc<ReconcileReport>> {
        self.last_report.load_full()
    }

    /// Replace the map collaborator, e.g. after it was recreated.
    pub fn set_map(&mut self, map: Arc<dyn CidrMap>) -> Result<(), AgentError> {
        if self.state == AgentState::Running {
            return Err(AgentError::AlreadyRunning);
        }
        self.map = map;
        Ok(())
    }

    /// Converge the map once, then keep watching for changes.
    ///
    /// A failed restore pass is reported, not returned as an error; the
    /// watcher keeps retrying. Settings are checked first and nothing runs
    /// when they are invalid.
    pub async fn start(&mut self) -> Result<Arc<ReconcileReport>, AgentError> {
        if self.state == AgentState::Running {
            return Err(AgentError::AlreadyRunning);
        }
        validate_settings(&self.settings).map_err(AgentError::InvalidSettings)?;

        let reconciler = Arc::new(Reconciler::new(self.config_path.clone(), Arc::clone(&self.map)));

        // Baseline taken before the restore read so a write in between is
        // seen as a change.
        let mut watcher = ConfigWatcher::new(&self.config_path, &self.settings).await;
        let mut backoff = RetryBackoff::new(self.settings.retry_base(), self.settings.retry_max());

        let report = Arc::new(run_pass(&reconciler).await?);
        tracing::info!(
            path = ?self.config_path,
            outcome = report.outcome().as_str(),
            added = report.added.len(),
            removed = report.removed.len(),
            "Restored map from config"
        );
        if report.should_retry() {
            watcher.schedule_retry(backoff.next_delay());
        }
        self.last_report.store(Some(Arc::clone(&report)));

        let shutdown = Shutdown::new();
        let task = tokio::spawn(watch_loop(
            reconciler,
            watcher,
            backoff,
            shutdown.subscribe(),
            Arc::clone(&self.last_report),
        ));

        self.watcher = Some(RunningWatcher { shutdown, task });
        self.state = AgentState::Running;
        Ok(report)
    }

    /// Stop watching. Waits for an in-flight pass; never touches the map.
    pub async fn stop(&mut self) -> Result<(), AgentError> {
        let Some(running) = self.watcher.take() else {
            return Ok(());
        };

        running.shutdown.trigger();
        self.state = AgentState::Stopped;
        running.task.await?;

        tracing::info!(path = ?self.config_path, "Agent stopped, map left in place");
        Ok(())
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(running) = self.watcher.take() {
            running.shutdown.trigger();
        }
    }
}

/// Map calls may block (syscalls, file writes), so passes run off the
/// async workers. Awaiting the handle keeps passes serialized.
async fn run_pass(reconciler: &Arc<Reconciler>) -> Result<ReconcileReport, tokio::task::JoinError> {
    let reconciler = Arc::clone(reconciler);
    tokio::task::spawn_blocking(move || reconciler.reconcile()).await
}

async fn watch_loop(
    reconciler: Arc<Reconciler>,
    mut watcher: ConfigWatcher,
    mut backoff: RetryBackoff,
    mut shutdown: broadcast::Receiver<()>,
    last_report: Arc<ArcSwapOption<ReconcileReport>>,
) {
    loop {
        let trigger = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            trigger = watcher.changed() => trigger,
        };

        metrics::record_trigger(trigger.as_str());
        tracing::debug!(trigger = trigger.as_str(), "Reconciling");

        let report = match run_pass(&reconciler).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Reconciliation pass panicked");
                watcher.schedule_retry(backoff.next_delay());
                continue;
            }
        };

        if report.should_retry() {
            let delay = backoff.next_delay();
            tracing::warn!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                errors = report.errors.len(),
                "Pass incomplete, scheduling retry"
            );
            watcher.schedule_retry(delay);
        } else {
            backoff.reset();
            watcher.clear_retry();
        }

        last_report.store(Some(Arc::new(report)));
    }

    tracing::info!(path = ?watcher.path(), "Config watcher stopped");
}
