use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tickbus_logger::{LevelFilter, Logger};
use tickbus_ticker::{Ticker, load_config};
use tokio::signal;
use tracing::error;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML, JSON, YAML...). Environment overrides use `TICKBUS__`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run, overriding the configuration. `0` runs until Ctrl+C.
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Also write JSON log files into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Default log level when `RUST_LOG` is not set.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = Logger::builder().name(env!("CARGO_PKG_NAME")).level(cli.log_level);
    if let Some(dir) = &cli.log_dir {
        logger = logger.file(dir).json(true);
    }
    let _log = logger.init()?;

    let mut cfg =
        load_config(cli.config.as_deref()).context("Critical: Configuration is malformed")?;
    if let Some(ticks) = cli.ticks {
        cfg.ticks = ticks;
    }

    Ticker::new(cfg)?.run(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
