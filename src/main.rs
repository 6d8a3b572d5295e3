//! Fluxify - File Format Conversion Engine
//!
//! Command line entry point: loads configuration, assembles the converter
//! registry once and runs a single command against it.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fluxify::cli::{Args, Commands};
use fluxify::config::Config;
use fluxify::registry::Registry;
use fluxify::tool::{check_availability, CommandRunner, SystemRunner};

const DEFAULT_CONFIG: &str = "fluxify.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG);
                Config::from_file(DEFAULT_CONFIG)?
            } else {
                Config::default()
            }
        }
    };

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::with_timeout(config.tool_timeout()));

    match args.command {
        Commands::Convert { input, format, transcode } => {
            let registry = Registry::from_config(&config, runner);
            match registry.convert(&input, &format, transcode.into()).await {
                Ok(output) => {
                    for path in output.paths() {
                        println!("{}", path.display());
                    }
                }
                Err(e) => {
                    error!("Conversion failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Formats { ext } => {
            let registry = Registry::from_config(&config, runner);
            let formats = registry.supported_formats();
            let json = match ext {
                Some(ext) => {
                    let ext = ext.trim_start_matches('.').to_lowercase();
                    serde_json::to_string_pretty(&formats.get(&ext).cloned().unwrap_or_default())?
                }
                None => serde_json::to_string_pretty(formats)?,
            };
            println!("{}", json);
        }
        Commands::Check => {
            let statuses = check_availability(runner.as_ref(), &config.tools).await;
            println!("{:<12} {:<10} {:<30} {}", "Tool", "Status", "Program", "Detail");
            println!("{}", "-".repeat(80));
            for status in &statuses {
                println!(
                    "{:<12} {:<10} {:<30} {}",
                    status.name,
                    if status.available { "ok" } else { "missing" },
                    status.program,
                    status.detail
                );
            }
            let missing = statuses.iter().filter(|s| !s.available).count();
            if missing > 0 {
                info!("{} of {} tools unavailable", missing, statuses.len());
            }
        }
        Commands::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".fluxify").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive the program
    let file_appender = rolling::daily(&log_dir, "fluxify.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console goes to stderr so stdout carries only command output
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("fluxify.log").display()
    );

    Ok(())
}
