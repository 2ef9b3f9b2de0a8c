//! IP masquerade exemption agent (v0.1)
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────┐     ┌───────────────┐     ┌─────────────────┐
//!   │ exemption file   │────▶│ ConfigWatcher │────▶│   Reconciler    │
//!   │ (YAML / JSON)    │     │  (debounce)   │     │ read/dump/diff  │
//!   └──────────────────┘     └───────────────┘     └────────┬────────┘
//!                                                           │ update / delete
//!                                                           ▼
//!                                                  ┌─────────────────┐
//!                                                  │    CidrMap      │
//!                                                  │ (pinned state)  │
//!                                                  └─────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use masq_agent::config::validation::validate_settings;
use masq_agent::config::{load_settings, AgentSettings, SettingsError};
use masq_agent::lifecycle::signals::wait_for_shutdown;
use masq_agent::observability::logging::{self, LogFormat};
use masq_agent::observability::metrics;
use masq_agent::{Agent, CidrMap, MemoryCidrMap, PinnedCidrMap, Reconciler};

#[derive(Parser)]
#[command(name = "masq-agent")]
#[command(about = "Keeps the non-masquerade CIDR map in sync with its config file", long_about = None)]
struct Cli {
    /// Exemption config file (YAML or JSON).
    #[arg(short, long, default_value = "/etc/config/ip-masq-agent")]
    config: PathBuf,

    /// Pinned map state file. Without it the map lives in memory only.
    #[arg(long)]
    map_state: Option<PathBuf>,

    /// Agent settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the debounce window.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Override the periodic resync interval.
    #[arg(long)]
    resync_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Expose Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Reconcile once and exit; non-zero status unless converged.
    #[arg(long)]
    once: bool,
}

fn resolve_settings(cli: &Cli) -> Result<AgentSettings, SettingsError> {
    let mut settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => AgentSettings::default(),
    };

    if let Some(debounce_ms) = cli.debounce_ms {
        settings.debounce_ms = debounce_ms;
        settings.max_debounce_ms = settings.max_debounce_ms.max(debounce_ms);
    }
    if let Some(resync_secs) = cli.resync_secs {
        settings.resync_interval_secs = resync_secs;
    }

    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    tracing::info!("masq-agent v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = resolve_settings(&cli)?;
    tracing::info!(
        config = ?cli.config,
        debounce_ms = settings.debounce_ms,
        resync_interval_secs = settings.resync_interval_secs,
        "Configuration loaded"
    );

    let map: Arc<dyn CidrMap> = match &cli.map_state {
        Some(path) => Arc::new(PinnedCidrMap::open(path)?),
        None => {
            tracing::warn!("No --map-state given, map contents are lost on exit");
            Arc::new(MemoryCidrMap::new())
        }
    };

    if let Some(addr) = cli.metrics_address {
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(metrics_address = %addr, error = %e, "Failed to start metrics endpoint");
        }
    }

    if cli.once {
        let report = Reconciler::new(&cli.config, map).reconcile();
        for error in &report.errors {
            tracing::error!(error = %error, "Reconciliation error");
        }
        tracing::info!(
            outcome = report.outcome().as_str(),
            applied = report.applied(),
            "Single pass complete"
        );
        if !report.is_converged() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut agent = Agent::new(&cli.config, map, settings);
    agent.start().await?;

    wait_for_shutdown().await;

    agent.stop().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
