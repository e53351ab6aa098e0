use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::helper_functions::project_root;

mod analysis;
mod config;
mod data_handling;
mod error;
mod helper_functions;
mod models;
mod pipeline;

fn main() -> anyhow::Result<()> {
    // Setup logging and project configuration
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the GO-term sharing analysis");

    let root = project_root();
    let config = Config::load(&root)
        .with_context(|| format!("loading configuration under {}", root.display()))?;
    info!(
        "{} organisms, {} trials per class, seed {}, null model mode {:?}",
        config.organisms.len(),
        config.null_model.trials,
        config.null_model.seed,
        config.null_model.mode
    );

    pipeline::run(&config).context("GO-term sharing analysis failed")?;

    info!("Done");
    Ok(())
}
