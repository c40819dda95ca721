//! runpad-relay binary
//!
//! Serves `POST /api/execute` and forwards requests to the configured
//! execution provider. Provider credentials are read from the environment
//! (or a `.env` file) and never leave this process.

use anyhow::Result;
use clap::{ArgAction, Parser};
use log::LevelFilter;
use runpad_relay::{
    shutdown_signal, HttpExecutionProvider, ProviderConfig, ProviderCredentials, RelayConfig,
    RelayServer, DEFAULT_PROVIDER_URL, DEFAULT_VERSION_INDEX,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Command line arguments for the relay.
#[derive(Parser, Debug)]
#[command(name = "runpad-relay")]
#[command(about = "Relay code execution requests to a remote execution provider")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, env = "RUNPAD_BIND_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Provider client id
    #[arg(long, env = "RUNPAD_CLIENT_ID", hide_env_values = true)]
    client_id: String,

    /// Provider client secret
    #[arg(long, env = "RUNPAD_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Provider execute endpoint
    #[arg(long, env = "RUNPAD_PROVIDER_URL", default_value = DEFAULT_PROVIDER_URL)]
    provider_url: String,

    /// Runtime version selector sent with every request
    #[arg(long, env = "RUNPAD_VERSION_INDEX", default_value = DEFAULT_VERSION_INDEX)]
    version_index: String,

    /// Upstream request timeout in seconds
    #[arg(long, env = "RUNPAD_UPSTREAM_TIMEOUT", default_value_t = 30)]
    upstream_timeout: u64,

    /// CORS allowed origins (comma-separated)
    #[arg(long, env = "RUNPAD_CORS_ORIGINS")]
    cors_origins: Option<String>,

    /// Maximum request body size in bytes
    #[arg(long, env = "RUNPAD_MAX_BODY_SIZE", default_value_t = 1048576)] // 1MB
    max_body_size: usize,

    /// Enable request logging
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    logging: bool,

    /// Log level
    #[arg(long, short, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level_filter = args.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let credentials = ProviderCredentials::new(args.client_id, args.client_secret)?;
    let provider_config = ProviderConfig::new(credentials)
        .with_url(&args.provider_url)
        .with_version_index(&args.version_index)
        .with_timeout(Duration::from_secs(args.upstream_timeout));
    let provider = HttpExecutionProvider::new(provider_config);

    let cors_origins = args
        .cors_origins
        .map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let bind_addr = SocketAddr::new(args.host, args.port);
    let config = RelayConfig::new()
        .with_bind_addr(bind_addr)
        .with_cors_origins(cors_origins)
        .with_max_body_size(args.max_body_size)
        .with_logging(args.logging);

    log::info!("Starting runpad relay...");
    log::info!("Configuration:");
    log::info!("  Bind address: {}", bind_addr);
    log::info!("  Provider: {}", args.provider_url);
    log::info!("  Version index: {}", args.version_index);
    log::info!("  Upstream timeout: {}s", args.upstream_timeout);
    log::info!("  Max body size: {} bytes", args.max_body_size);
    log::info!("  Logging enabled: {}", args.logging);

    let server = RelayServer::with_config(provider, config);
    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Relay failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
