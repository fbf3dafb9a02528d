//! Kidecar CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use http_probe::HttpProbePlugin;
use kidecar_config::SidecarConfig;
use kidecar_plugin_api::Capabilities;
use kidecar_runtime::{SidecarHost, SignalHandler};
use kidecar_store::{KubeClusterClient, PodIdentity, StorageFactory, StoreContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "/opt/kidecar/config.yaml";

#[derive(Parser)]
#[command(name = "kidecar")]
#[command(about = "Sidecar plugin host for Kubernetes pods", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the plugin host
    Serve {
        /// Path to configuration file
        #[arg(short, long, env = "KIDECAR_CONFIG", default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,

        /// Log output format
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, env = "KIDECAR_CONFIG", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            log_level,
            log_format,
        } => {
            init_tracing(&log_level, log_format)?;
            serve(&config).await
        }

        Commands::Validate { config } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", config.display());

            match kidecar_config::load(&config) {
                Ok(cfg) => {
                    tracing::info!("✓ Configuration is valid");
                    tracing::info!("  Plugins: {}", cfg.plugins.len());
                    for plugin in &cfg.plugins {
                        tracing::info!("    - {} (bootOrder {})", plugin.name, plugin.boot_order);
                    }
                    tracing::info!("  Restart policy: {}", cfg.restart_policy);
                    tracing::info!("  Start order: {:?}", cfg.sidecar_start_order);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("kidecar");
            println!("Version: {}", kidecar_runtime::VERSION);
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

async fn serve(path: &Path) -> Result<()> {
    tracing::info!(version = kidecar_runtime::VERSION, "Starting kidecar");
    tracing::info!("Config file: {}", path.display());

    let config = kidecar_config::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let host = SidecarHost::new(config.clone(), capabilities(&config));
    host.register(HttpProbePlugin::new()).await?;

    for name in config.plugin_names() {
        if !host.is_registered(name) {
            tracing::warn!(plugin = %name, "Configured plugin has no implementation, ignoring");
        }
    }

    tokio::spawn(SignalHandler::new(host.shutdown_token()).run());

    let result = host.start().await;

    if let Err(e) = host.stop_all().await {
        tracing::warn!(error = %e, "Some plugins did not stop cleanly");
    }
    host.shutdown().await;

    result?;
    tracing::info!("Kidecar stopped");
    Ok(())
}

fn capabilities(config: &SidecarConfig) -> Capabilities {
    let mut ctx = StoreContext::new(Arc::new(KubeClusterClient::new()))
        .with_metrics_listen(config.host.metrics_listen);

    match PodIdentity::from_env() {
        Ok(pod) => {
            tracing::info!(pod = %pod, "Running in pod");
            ctx = ctx.with_pod(pod);
        }
        Err(e) => tracing::warn!(error = %e, "Pod identity unknown, InKube storage disabled"),
    }

    Capabilities::new(Arc::new(StorageFactory::new(ctx)))
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(filter.into())
        // connection pool logging is noisy at debug
        .add_directive("hyper_util=info".parse()?);

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
    }

    Ok(())
}
