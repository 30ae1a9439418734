use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use cosim_server::{registry_server, ServiceRegistry};
use cosim_shared::{CoSimConfig, ServiceAddress};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(name = "cosim-host")]
#[command(about = "Discovery registry for co-simulation services")]
struct Args {
    /// TOML configuration file; the `[host]` table is used
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (host:port), overrides the configuration
    #[arg(short, long)]
    listen: Option<ServiceAddress>,

    /// Runtime worker threads, overrides the configuration
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CoSimConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CoSimConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.host.listen = listen;
    }
    if let Some(workers) = args.workers {
        config.host.worker_threads = workers;
    }
    config.validate().context("invalid configuration")?;

    let registry = Arc::new(ServiceRegistry::new());
    let mut host = registry_server(Arc::clone(&registry), &config.host);
    let addr = host.start().context("starting registry host")?;
    info!(%addr, "registry listening, press ctrl-c to stop");

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    signals
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for ctrl-c")?;

    info!(services = registry.len(), "shutting down registry");
    host.dispose();
    Ok(())
}
