//! tape gateway server
//!
//! Serves fallback market data and simulated live bars.

use clap::Parser;
use std::path::PathBuf;
use tape_server::config::{CliArgs as ConfigCliArgs, LogLevel, build_config, with_usage_stats};
use tape_server::server::Server;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// tape gateway - fallback market data over HTTP
#[derive(Parser, Debug)]
#[command(name = "tape-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long, env = "TAPE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TAPE_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TAPE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines (`--log-json=false` turns it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    log_json: Option<bool>,

    /// Directory with static chart assets
    #[arg(long, value_name = "DIR", env = "TAPE_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Answer exhausted queries with a simulated series
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    synthetic_fallback: Option<bool>,
}

impl From<Args> for ConfigCliArgs {
    fn from(args: Args) -> Self {
        Self {
            config_file: args.config,
            host: args.host,
            port: args.port,
            log_level: args.log_level,
            log_json: args.log_json,
            static_dir: args.static_dir,
            synthetic_fallback: args.synthetic_fallback,
        }
    }
}

/// `RUST_LOG` wins over the configured level; either way fetch outcomes
/// stay visible.
fn init_tracing(log_level: LogLevel, json: bool) -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|env| !env.trim().is_empty())
        .unwrap_or_else(|| log_level.as_filter_str().to_string());
    let filter = EnvFilter::try_new(with_usage_stats(&directives))?;
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cli_args: ConfigCliArgs = args.into();
    let config = build_config(&cli_args)?;

    init_tracing(config.log_level, config.log_json)?;

    tracing::info!("tape server v{}", tape_server::VERSION);
    tracing::info!(
        host = %config.host,
        port = %config.port,
        log_level = %config.log_level,
        static_dir = ?config.static_dir,
        synthetic_fallback = config.synthetic_fallback,
        history_len = config.history_len,
        tick_interval_ms = config.tick_interval_ms,
        alphavantage = config.alphavantage_key.is_present(),
        finnhub = config.finnhub_key.is_present(),
        "Server configuration loaded"
    );

    let server = Server::new(config)?;
    tracing::info!(address = %server.socket_addr(), "Starting server");

    server.run().await?;

    Ok(())
}
