//! CLI entry point for the lanwatch sweep daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use lanwatch_core::record::count_scan_runs_in;
use lanwatch_discover::classify::VendorTable;
use lanwatch_discover::config::{default_config_path, DiscoverConfig};
use lanwatch_discover::persist::load_snapshot;
use lanwatch_discover::probe::SystemProbe;
use lanwatch_discover::range::HostRange;
use lanwatch_discover::scheduler::ScanScheduler;

#[derive(Parser)]
#[command(name = "lanwatch-discover")]
#[command(about = "Periodically sweep an IPv4 range and record live hosts and changes")]
struct Cli {
    /// Config file (default: config.cfg next to the executable).
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = DiscoverConfig::load(&config_path);
    let vendors = VendorTable::load(&config.oui_file);

    let range = HostRange::from_config(&config).with_context(|| {
        format!(
            "Failed to compute the range for {}/{}",
            config.network, config.cidr
        )
    })?;

    tracing::info!(
        network = %config.network,
        cidr = config.cidr,
        hosts = range.len(),
        interval_secs = config.interval_secs,
        timeout_secs = config.timeout_secs,
        threads = config.threads,
        "Config loaded"
    );
    tracing::info!(
        history_file = %config.history_file.display(),
        changes_file = %config.changes_file.display(),
        last_seen_file = %config.last_seen_file.display(),
        "Record files"
    );

    match count_scan_runs_in(&config.history_file) {
        Ok(runs) => tracing::info!(runs, "Recorded scans in history"),
        Err(e) => tracing::warn!(error = %e, "Could not read history file"),
    }

    let previous = load_snapshot(&config.last_seen_file).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read snapshot, starting from an empty set");
        Default::default()
    });
    tracing::info!(devices = previous.len(), "Previous snapshot loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Interrupt received, stopping after in-flight writes");
        let _ = shutdown_tx.send(true);
    });

    let scheduler = ScanScheduler::new(&config, range, Arc::new(SystemProbe::new()), vendors)
        .with_previous(previous);
    scheduler.run(shutdown_rx).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
