//! `calcwire-client`: send calc/gpt requests to a server or proxy.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use calcwire_core::config::CalcwireConfig;
use calcwire_core::protocol::Request;
use calcwire_net::{Client, init_tracing};
use clap::{Parser, ValueEnum};

/// Expressions offered by the interactive menu.
const PRESET_EXPRESSIONS: [&str; 3] = ["2 * (4 + 6) / 5", "sqrt(9) + tan(0)", "5**2 + 3 * log(e)"];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Calc,
    Gpt,
}

/// Client for the calcwire JSON-over-TCP protocol.
#[derive(Parser, Debug)]
#[command(name = "calcwire-client", version, about)]
struct Args {
    /// Path to calcwire.toml.
    #[arg(long, env = "CALCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Target host.
    #[arg(long)]
    host: Option<String>,

    /// Target port (5555 for the server, 5554 for the proxy).
    #[arg(long)]
    port: Option<u16>,

    /// Request mode.
    #[arg(long, value_enum)]
    mode: Mode,

    /// Expression for calc mode. Prompted for when omitted.
    #[arg(long)]
    expr: Option<String>,

    /// Prompt for gpt mode. Prompted for when omitted.
    #[arg(long)]
    prompt: Option<String>,

    /// Ask the server not to use its cache.
    #[arg(long)]
    no_cache: bool,

    /// Send the same request this many times, one connection each.
    #[arg(long, default_value_t = 1)]
    repeat: u32,
}

fn read_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("stdin closed");
    }
    Ok(line.trim().to_string())
}

fn choose_expression() -> Result<String> {
    println!("\n--- choose an expression (calc) ---");
    for (i, expr) in PRESET_EXPRESSIONS.iter().enumerate() {
        println!("  {}. {expr}", i + 1);
    }
    println!("  4. type your own");

    loop {
        let choice = read_line("choice (1-4): ")?;
        match choice.parse::<usize>() {
            Ok(n @ 1..=3) => return Ok(PRESET_EXPRESSIONS[n - 1].to_string()),
            Ok(4) => {
                let expr = read_line("expression: ")?;
                if !expr.is_empty() {
                    return Ok(expr);
                }
            }
            Ok(_) => println!("invalid choice, try again"),
            Err(_) => println!("not a number, try again"),
        }
    }
}

fn build_request(args: &Args) -> Result<Request> {
    let request = match args.mode {
        Mode::Calc => {
            let expr = match &args.expr {
                Some(expr) => expr.clone(),
                None => choose_expression()?,
            };
            if expr.is_empty() {
                bail!("no expression given");
            }
            Request::calc(expr)
        }
        Mode::Gpt => {
            let prompt = match &args.prompt {
                Some(prompt) => prompt.clone(),
                None => {
                    println!("\n--- prompt (gpt) ---");
                    read_line("prompt: ")?
                }
            };
            if prompt.is_empty() {
                bail!("no prompt given");
            }
            Request::gpt(prompt)
        }
    };
    Ok(request.with_cache(!args.no_cache))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CalcwireConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CalcwireConfig::default(),
    };
    if let Some(host) = &args.host {
        config.client.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.client.port = port;
    }
    init_tracing(&config.general.log_level);

    let request = build_request(&args)?;
    let client = Client::from_config(&config.client);

    for i in 1..=args.repeat {
        println!("\nsending request #{i}/{} to {}...", args.repeat, client.addr());
        match client.request(&request).await {
            Ok(response) => {
                println!("--- response ---");
                println!("{}", serde_json::to_string_pretty(&response)?);
                println!("----------------");
            }
            Err(e) => {
                eprintln!("exchange failed: {e}. stopping.");
                break;
            }
        }
    }
    Ok(())
}
