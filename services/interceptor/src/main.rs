//! ASOA interception service
//!
//! Relays UDP traffic from `transport.listen` to `transport.upstream`,
//! applying the directive from the config file to matching frames.
//!
//! Usage:
//!   asoa-interceptor --config config/interceptor.toml
//!   asoa-interceptor --log-level debug --json-logs

use anyhow::{Context, Result};
use clap::Parser;
use interceptor::{
    init_logging, InterceptionPipeline, InterceptorConfig, MutationRecord, NoopPoisoner,
    ObserverError, UdpRelay,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "asoa-interceptor")]
#[command(about = "ASOA protocol interception relay")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/interceptor.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum ConfigSource {
    File,
    Defaults,
}

fn config_source(path: &Path) -> ConfigSource {
    if path.is_file() {
        ConfigSource::File
    } else {
        ConfigSource::Defaults
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = InterceptorConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.logging.json |= args.json_logs;
    init_logging(&config.logging)?;

    info!("Starting ASOA interceptor (protocol v{})", codec::PROTOCOL_VERSION);
    // Config load runs before the subscriber exists
    match config_source(Path::new(&args.config)) {
        ConfigSource::File => info!("Configuration: {}", args.config),
        ConfigSource::Defaults => warn!("Config file {} not found, using defaults", args.config),
    }
    info!(
        "{} known services, {} worker(s)",
        config.services.len(),
        config.pipeline.workers
    );

    let relay = Arc::new(UdpRelay::bind(&config.transport).await?);
    let pipeline = InterceptionPipeline::new(
        &config,
        relay.clone(),
        relay.clone(),
        Arc::new(NoopPoisoner),
    )?;

    pipeline.register_observer(Arc::new(
        |record: &MutationRecord| -> Result<(), ObserverError> {
            info!(target: "mutations", "{}", serde_json::to_string(record)?);
            Ok(())
        },
    ));

    match &config.directive {
        Some(spec) => pipeline.arm(spec).map_err(|e| {
            error!("Rejected directive from configuration: {}", e);
            e
        })?,
        None => warn!("No directive configured, relaying traffic unmodified"),
    }

    pipeline.start().await?;
    info!(
        "Relaying {} → {}",
        relay.local_addr()?,
        relay.upstream()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C signal handler")?;
    info!("Received shutdown signal");

    let stats = pipeline.stop().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
