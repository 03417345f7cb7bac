//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Where init put things
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
}

/// Write the default config (unless one exists and `force` is off) and create the schema
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitReport> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.save()?;
    let db = MetaDb::connect(&config).await?;
    db.init_schema().await?;

    info!(config = %config.paths.config_file.display(), "Initialized modindex");
    Ok(InitReport {
        config_path: config.paths.config_file.clone(),
        db_path: config.paths.db_file.clone(),
    })
}

pub fn print_init_report(report: &InitReport) {
    println!("✓ modindex initialized successfully");
    println!("  Config:   {}", report.config_path.display());
    println!("  Database: {}", report.db_path.display());
    println!("\nNext steps:");
    println!("  1. Export a token (GITHUB_TOKEN) for the higher rate limit");
    println!("  2. Run a full sync: modindex sync");
}
