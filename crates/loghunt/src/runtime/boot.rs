//! Boot: logging init, config load, registry and dispatcher creation.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::HuntConfig;
use crate::dispatch::{Dispatcher, FsReader};
use crate::parser::build_registry;

/// Initialise the tracing / logging subsystem. Logs go to stderr so
/// stdout carries only command output.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loghunt=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load config, build the registry, and load every configured
/// parser directory.
///
/// Returns `(Dispatcher, HuntConfig)` on success.
pub fn boot(config_path: Option<&str>) -> Result<(Dispatcher, HuntConfig), Box<dyn std::error::Error>> {
    info!("Starting loghunt v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file or env)
    let config = match config_path {
        Some(path) => HuntConfig::load_from(path)?,
        None => HuntConfig::load()?,
    };
    info!(
        "Loaded configuration: default_format={}, strip_ansi={}, threshold={}",
        config.default_format, config.strip_ansi, config.severity_threshold
    );

    let registry = Arc::new(build_registry());
    let dispatcher = Dispatcher::from_config(registry, Arc::new(FsReader), &config);

    for dir in &config.config_dirs {
        dispatcher.load_config_dir(dir).map_err(|e| {
            error!("Failed to load parser configs from {}: {}", dir, e);
            e
        })?;
    }

    info!("Registry ready with {} parsers", dispatcher.registry().len());
    Ok((dispatcher, config))
}
