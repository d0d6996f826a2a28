//! Download watcher.
//!
//! Watches the download folder and files finished episodes into the anime
//! and series libraries. Operator commands are read from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use download_watcher::{
    execute, parse_command, AliasStore, Command, RelocationSettings, TracingNotifier, Watcher,
    WatcherService,
};
use shared::{Config, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Server share root, overrides the library folders of the config
    #[arg(long)]
    share_root: Option<PathBuf>,

    /// Run a single pass, print its report as JSON and exit
    #[arg(long)]
    once: bool,

    /// Also re-check quarantined files (with --once)
    #[arg(long)]
    deep: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(share_root) = &args.share_root {
        config.use_share_root(share_root);
    }

    // Initialize logging
    let mut log_config = LogConfig::from_config(&config, "download-watcher")?;
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Download Watcher starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    let paths = config.library_paths();
    paths.validate().context("Library folders are not usable")?;
    info!(
        anime = %paths.anime_dir().display(),
        series = %paths.series_dir().display(),
        downloads = %paths.download_dir().display(),
        "Library folders"
    );

    let service = WatcherService::new(
        paths,
        RelocationSettings::from_config(&config),
        AliasStore::new(config.mappings_path()),
        Arc::new(TracingNotifier),
    )
    .context("Failed to build the directory index")?;
    let service = Arc::new(service);

    if args.once {
        let deep = args.deep;
        let report = tokio::task::spawn_blocking(move || service.trigger_pass(deep))
            .await
            .context("Relocation pass panicked")??;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let interval = Duration::from_secs(config.watcher.interval_seconds);
    let watcher = Watcher::new(Arc::clone(&service), interval).spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Received Ctrl-C");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Command::Stop) => {
                        println!("Stopping");
                        break;
                    }
                    Ok(command) => {
                        let service = Arc::clone(&service);
                        match tokio::task::spawn_blocking(move || execute(&service, &command)).await {
                            Ok(reply) => println!("{}", reply),
                            Err(e) => error!(error = %e, "Command panicked"),
                        }
                    }
                    Err(e) => println!("{}", e),
                },
                Ok(None) => {
                    info!("Stdin closed, running until Ctrl-C");
                    tokio::signal::ctrl_c().await?;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Could not read from stdin, running until Ctrl-C");
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
        }
    }

    watcher.stop().await?;
    info!("Download Watcher finished");
    Ok(())
}
