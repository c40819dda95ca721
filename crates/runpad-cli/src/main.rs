//! `runpad` command line client.
//!
//! Drives the client orchestrator with in-process widgets: the file's contents
//! become the editor buffer and the terminal prints to stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use runpad_client::config::DEFAULT_RELAY_URL;
use runpad_client::headless::{MemoryEditorFactory, ResizeListeners, StdoutTerminalFactory};
use runpad_client::{
    ClientConfig, ExecutionBackend, LoadSignal, MountPoint, OfflineBackend, Orchestrator,
    OrchestratorProps, RelayBackend,
};
use runpad_types::Language;

#[derive(Parser, Debug)]
#[clap(name = "runpad", author, version, about = "Run code through the runpad sandbox")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a source file and print its output
    Run {
        /// Source file to run
        file: PathBuf,

        /// Language (defaults to the file extension)
        #[clap(long, short = 'L')]
        language: Option<Language>,

        /// Relay base URL [default: http://localhost:5000]
        #[clap(long, env = "RUNPAD_RELAY_URL")]
        relay: Option<String>,

        /// Approximate output locally instead of executing (overrides --relay)
        #[clap(long)]
        offline: bool,

        /// Request timeout in seconds
        #[clap(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Check that the relay is reachable
    Health {
        /// Relay base URL
        #[clap(long, env = "RUNPAD_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
        relay: String,
    },
}

fn detect_language(file: &Path, explicit: Option<Language>) -> Result<Language> {
    if let Some(language) = explicit {
        return Ok(language);
    }
    let ext = file
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    Language::from_extension(ext).with_context(|| {
        format!(
            "Cannot infer language from '{}', pass --language",
            file.display()
        )
    })
}

/// Pick the backend for a run. `--offline` wins over any relay URL.
fn select_backend(config: &ClientConfig, offline: bool) -> Arc<dyn ExecutionBackend> {
    if offline {
        Arc::new(OfflineBackend::new())
    } else {
        Arc::new(RelayBackend::from_config(config))
    }
}

async fn run(
    file: PathBuf,
    language: Option<Language>,
    config: ClientConfig,
    backend: Arc<dyn ExecutionBackend>,
) -> Result<ExitCode> {
    let code = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let language = detect_language(&file, language)?;

    // Nothing to load out-of-band here, so the libraries are ready up front.
    let signal = LoadSignal::new();
    signal.mark_editor_loaded();
    signal.mark_terminal_loaded();

    let mut orchestrator = Orchestrator::new(OrchestratorProps {
        config: config.with_settle_delay(Duration::ZERO).with_banner(""),
        registry: Arc::new(signal.clone()),
        load_signal: Some(signal),
        editor_factory: Arc::new(MemoryEditorFactory::new()),
        terminal_factory: Arc::new(StdoutTerminalFactory),
        window: Arc::new(ResizeListeners::new()),
        backend,
        initial_code: code,
        language,
    });

    orchestrator.mount_terminal(MountPoint::new("stdout"));
    orchestrator.mount_editor(MountPoint::new(file.display().to_string()));
    orchestrator.wait_until_interactive().await?;

    let result = orchestrator.run_to_completion().await?;
    orchestrator.teardown();

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    match cli.command {
        Commands::Run {
            file,
            language,
            relay,
            offline,
            timeout,
        } => {
            let mut config =
                ClientConfig::default().with_request_timeout(Duration::from_secs(timeout));
            match relay {
                Some(relay) if offline => {
                    log::info!("Running offline, ignoring relay URL {}", relay);
                }
                Some(relay) => config = config.with_relay_url(relay),
                None => {}
            }

            let backend = select_backend(&config, offline);
            log::debug!("Using {} backend", backend.name());
            run(file, language, config, backend).await
        }
        Commands::Health { relay } => {
            let config = ClientConfig::default().with_relay_url(relay);
            let backend = RelayBackend::from_config(&config);
            backend.health_check().await?;
            println!("Relay at {} is healthy", backend.base_url());
            Ok(ExitCode::SUCCESS)
        }
    }
}
