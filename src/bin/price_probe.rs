// src/bin/price_probe.rs
use autonom::config::OracleConfig;
use autonom::providers;
use autonom::types::{scale_by_expo, ProviderId};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Fetch the configured reference price once and print it scaled. Sends nothing.
#[derive(Parser, Debug)]
struct Args {
    /// Override PRICE_PROVIDER (commodities, fred, eia, ninjas)
    #[arg(long)]
    provider: Option<ProviderId>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let cfg = OracleConfig::from_lookup(
        |key| match (key, args.provider) {
            ("PRICE_PROVIDER", Some(p)) => Some(p.to_string()),
            _ => std::env::var(key).ok(),
        },
        false,
    )?;
    let source = providers::from_config(&cfg)?;
    let obs = source.fetch().await?;
    let scaled = scale_by_expo(obs.value, cfg.expo, cfg.value_type)?;
    println!(
        "{} -> price={} scaled={} open={} at={}",
        obs.provider,
        obs.value,
        scaled,
        cfg.market.is_open(obs.observed_at),
        obs.observed_at.to_rfc3339()
    );
    Ok(())
}
