//! `calcwire-server`: the compute server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use calcwire_core::config::CalcwireConfig;
use calcwire_llm::{Generator, LlmClient, LlmGenerator};
use calcwire_net::{Server, init_tracing};
use clap::Parser;
use tracing::info;

/// Line-delimited JSON compute server (calc / gpt).
#[derive(Parser, Debug)]
#[command(name = "calcwire-server", version, about)]
struct Args {
    /// Path to calcwire.toml. Defaults apply when omitted.
    #[arg(long, env = "CALCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,

    /// Capacity of the result cache.
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
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(cache_size) = args.cache_size {
        config.server.cache_size = cache_size;
    }
    if let Some(level) = args.log_level {
        config.general.log_level = level;
    }

    init_tracing(&config.general.log_level);

    let client = LlmClient::from_config(&config.llm).context("configuring text generation")?;
    let generator = LlmGenerator::with_config(client, &config.llm);
    info!(live = generator.is_live(), "text generation backend");
    let generator: Arc<dyn Generator> = Arc::new(generator);

    let server = Server::bind(&config.server, generator)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr()))?;
    let dispatcher = server.dispatcher();
    let counters = server.counters();

    tokio::select! {
        () = server.run() => {}
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            info!(
                counters = ?counters.snapshot(),
                cache = ?dispatcher.cache_stats(),
                "shutting down"
            );
        }
    }
    Ok(())
}
