// src/bin/oracle_daemon.rs
use anyhow::Context;
use autonom::{
    config::OracleConfig,
    oracle::Oracle,
    providers,
    publishing::{self, ChainPublisher, DryRunPublisher},
};
use clap::Parser;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "oracle_daemon", about = "Push a reference commodity price to an on-chain feed")]
struct Args {
    /// Run a single cycle and exit (0: confirmed or market closed, 1: failed)
    #[arg(long)]
    once: bool,
    /// Log the updatePrice call instead of sending it; chain settings become optional
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("no .env loaded: {e}");
    }
    let cfg = OracleConfig::from_env(!args.dry_run).context("configuration")?;
    let source = providers::from_config(&cfg).context("price provider")?;

    #[cfg(feature = "metrics")]
    if let Some(addr) = cfg.metrics_addr {
        tokio::spawn(async move {
            if let Err(e) = autonom::metrics::serve(addr).await {
                tracing::warn!("metrics server stopped: {e}");
            }
        });
    }

    match &cfg.chain {
        Some(chain) => {
            let publisher = publishing::connect(chain, cfg.value_type).context("chain publisher")?;
            drive(Oracle::new(&cfg, source, publisher), args.once).await
        }
        None => drive(Oracle::new(&cfg, source, DryRunPublisher), args.once).await,
    }
}

async fn drive<Pu: ChainPublisher>(mut oracle: Oracle<Pu>, once: bool) -> anyhow::Result<ExitCode> {
    if once {
        let attempt = oracle.run_once().await;
        return Ok(ExitCode::from(attempt.exit_code()));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl-c received, stopping");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::warn!("cannot listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        }
    });

    oracle.run(shutdown_rx).await;
    Ok(ExitCode::SUCCESS)
}
