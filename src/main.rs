//! pocketserve: serve an exported web build to devices on the LAN over HTTPS.
//!
//! This is the application entry point. It parses arguments, loads the
//! optional TOML configuration, initializes tracing, installs the signal
//! handlers, and hands over to the launcher.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use axum_server::Handle;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pocketserve::config::{AppConfig, ConfigError, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use pocketserve::http::setup_shutdown_handler;
use pocketserve::{LaunchError, Launcher};

/// pocketserve: preview a web build on your phone over HTTPS
#[derive(Parser, Debug)]
#[command(name = "pocketserve", version, about)]
struct Args {
    /// Path to configuration file (default: ./pocketserve.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory containing the exported build
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Certificate file (PEM)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Private key file (PEM)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Host to advertise in the URL and certificate instead of the detected LAN address
    #[arg(long)]
    host: Option<String>,

    /// Generate a new certificate even if one exists
    #[arg(long)]
    regenerate_cert: bool,

    /// Log level filter (e.g., "pocketserve=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).is_file() => {
            AppConfig::load(DEFAULT_CONFIG_PATH)?
        }
        None => AppConfig::default(),
    };

    // CLI overrides file values
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(root) = &args.root {
        config.site.root = root.clone();
    }
    if let Some(cert) = &args.cert {
        config.tls.cert_path = cert.clone();
    }
    if let Some(key) = &args.key {
        config.tls.key_path = key.clone();
    }
    if let Some(host) = &args.host {
        config.http.advertise_host = Some(host.clone());
    }
    config.validate()?;

    let cwd = std::env::current_dir()?;
    config.resolve_paths(&cwd);
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!(
        root = %config.site.root.display(),
        port = config.http.port,
        cert = %config.tls.cert_path.display(),
        key = %config.tls.key_path.display(),
        "Loaded configuration"
    );

    let handle = Handle::new();
    setup_shutdown_handler(
        handle.clone(),
        Duration::from_secs(config.http.shutdown_grace_seconds),
    );

    let launcher = Launcher::new(config).regenerate_cert(args.regenerate_cert);
    let mut stdout = std::io::stdout();

    match launcher.run(&mut stdout, handle).await {
        Ok(()) => ExitCode::SUCCESS,
        // Diagnostic already printed by the launcher
        Err(LaunchError::MissingExportDir { .. }) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
