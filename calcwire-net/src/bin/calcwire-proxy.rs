//! `calcwire-proxy`: caching proxy in front of a calcwire server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use calcwire_core::config::CalcwireConfig;
use calcwire_net::{Proxy, init_tracing};
use clap::Parser;
use tracing::info;

/// Application-level TCP proxy with its own LRU cache.
#[derive(Parser, Debug)]
#[command(name = "calcwire-proxy", version, about)]
struct Args {
    /// Path to calcwire.toml.
    #[arg(long, env = "CALCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to listen on.
    #[arg(long)]
    listen_host: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    listen_port: Option<u16>,

    /// Upstream server host.
    #[arg(long)]
    server_host: Option<String>,

    /// Upstream server port.
    #[arg(long)]
    server_port: Option<u16>,

    /// Capacity of the proxy cache.
    #[arg(long)]
    cache_size: Option<usize>,

    /// Log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CalcwireConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CalcwireConfig::default(),
    };
    let proxy_config = &mut config.proxy;
    if let Some(host) = args.listen_host {
        proxy_config.listen_host = host;
    }
    if let Some(port) = args.listen_port {
        proxy_config.listen_port = port;
    }
    if let Some(host) = args.server_host {
        proxy_config.server_host = host;
    }
    if let Some(port) = args.server_port {
        proxy_config.server_port = port;
    }
    if let Some(cache_size) = args.cache_size {
        proxy_config.cache_size = cache_size;
    }
    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }

    init_tracing(&config.general.log_level);

    let proxy = Proxy::bind(&config.proxy)
        .await
        .with_context(|| format!("binding {}", config.proxy.listen_addr()))?;
    let handler = proxy.handler();
    let counters = proxy.counters();

    tokio::select! {
        () = proxy.run() => {}
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            info!(
                counters = ?counters.snapshot(),
                cache = ?handler.cache_stats(),
                "shutting down"
            );
        }
    }
    Ok(())
}
