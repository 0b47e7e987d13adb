// src/main.rs

//! The command-line entry point: loads a submission from a TOML file, runs one
//! session against the service and prints the result URL.

use anyhow::Result;
use moss_client::MossClient;
use moss_client::config::Config;
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

const DEFAULT_LOG_LEVEL: &str = "info";

async fn run_app() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("moss-client version {VERSION}");
        return Ok(());
    }

    // The configuration path can be provided via --config; otherwise it
    // defaults to "moss.toml".
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("moss.toml");

    // Logging starts before the configuration is loaded so that warnings raised
    // while validating it are shown. `RUST_LOG` wins over the file's
    // `log_level`, which is applied once the file has been read.
    let env_log_level = env::var("RUST_LOG").ok();
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(
        env_log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL),
    ));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };

    if env_log_level.is_none()
        && let Err(e) = reload_handle.reload(EnvFilter::new(&config.log_level))
    {
        warn!("Could not apply log level '{}': {}", config.log_level, e);
    }

    let mut submission = config.submission;

    // Override port if provided as a command-line argument.
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        match args.get(port_index + 1).map(|s| s.parse::<u16>()) {
            Some(Ok(port)) if port != 0 => {
                submission = submission.with_port(port);
            }
            Some(_) => {
                eprintln!("Invalid port number: {}", args[port_index + 1]);
                std::process::exit(1);
            }
            None => {
                eprintln!("--port flag requires a value");
                std::process::exit(1);
            }
        }
    }

    info!("Submitting: {}", submission);

    match MossClient::submit(submission).await {
        Ok(url) => {
            println!("{url}");
            Ok(())
        }
        Err(e) => {
            error!("Submission failed: {}", e);
            Err(e.into())
        }
    }
}
