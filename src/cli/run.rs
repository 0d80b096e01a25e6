use crate::config::parse::load_config;
use crate::config::types::{Config, FileSpec};
use crate::dispatch::SinkTable;
use crate::rotate::run_rotation;
use crate::sink::{spawn_sinks, SinkError};
use crate::source::{GlobDiscovery, TailWorker};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/fling/config.yml");
            eprintln!("  /etc/fling/config.yml");
            eprintln!("\nUse --config <path> to specify a config file.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path).await.map_err(|e| e.into())
}

async fn run_pipeline(config_path: &PathBuf) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "loading configuration");

    // A load or validation failure aborts before any worker is spawned.
    let config = load_config(config_path)?;

    // Sink queues exist for every declared name before any producer starts.
    let table = spawn_sinks(&config.sinks)?;
    info!(sinks = config.sinks.len(), "sink workers started");

    spawn_rotations(&config);
    spawn_inputs(&config, &table);

    info!("fling started");

    // No drain protocol: the process runs until externally terminated.
    std::future::pending::<()>().await;
    Ok(())
}

fn spawn_rotations(config: &Config) {
    for rotation in &config.rotations {
        if rotation.interval <= 0 {
            warn!(
                files = ?rotation.files,
                interval = rotation.interval,
                "rotation interval not positive, never scheduled"
            );
            continue;
        }
        tokio::spawn(run_rotation(rotation.clone()));
    }
}

fn spawn_inputs(config: &Config, table: &SinkTable) {
    for file in &config.files {
        if file.is_glob {
            tokio::spawn(GlobDiscovery::new(file.clone(), Arc::clone(table)).run());
        } else {
            spawn_tail(file.clone(), table);
        }
    }
}

fn spawn_tail(spec: FileSpec, table: &SinkTable) {
    info!(path = %spec.path.display(), "adding tail for file");
    let worker = TailWorker::new(spec.path.clone(), spec, Arc::clone(table));
    tokio::spawn(worker.run());
}
