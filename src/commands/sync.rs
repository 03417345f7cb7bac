//! Sync and update commands - full and incremental passes plus categorization

use crate::error::Result;
use crate::sync::{IndexStats, SyncProgress, Syncer};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A sync pass and the categorization that followed it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub progress: SyncProgress,
    /// Absent when the pass was cancelled or an update changed nothing
    pub index: Option<IndexStats>,
}

/// Full sync followed by a categorization pass
pub async fn cmd_sync(syncer: &Syncer) -> Result<SyncReport> {
    let progress = syncer.sync_all().await?;
    let index = if progress.cancelled {
        warn!("Skipping categorization after cancelled sync");
        None
    } else {
        Some(syncer.rebuild_categories().await?)
    };
    Ok(SyncReport { progress, index })
}

/// Incremental sync; categories are rebuilt only when something changed
pub async fn cmd_update(syncer: &Syncer) -> Result<SyncReport> {
    let progress = syncer.sync_updates().await?;
    let index = if progress.cancelled || progress.updated_repos.is_empty() {
        info!("No repositories updated; categories unchanged");
        None
    } else {
        Some(syncer.rebuild_categories().await?)
    };
    Ok(SyncReport { progress, index })
}

pub fn print_sync_report(report: &SyncReport, incremental: bool) {
    let progress = &report.progress;
    if progress.cancelled {
        println!("\n⚠️  Sync cancelled\n");
    } else if incremental {
        println!("\n♻️  Update Complete\n");
    } else {
        println!("\n✓ Sync Complete\n");
    }

    println!("Repositories:  {}", progress.total_repos);
    println!("Processed:     {}", progress.processed_repos);
    println!("Skipped:       {}", progress.skipped_repos);
    if incremental {
        println!("Updated:       {}", progress.updated_repos.len());
        for name in &progress.updated_repos {
            println!("  - {}", name);
        }
    }
    if let Some(index) = &report.index {
        println!(
            "Modules tagged: {} ({} resource types, {} clusters)",
            index.modules_tagged, index.resource_types, index.clusters
        );
    }

    if !progress.errors.is_empty() {
        println!("\nErrors ({}):", progress.errors.len());
        for error in &progress.errors {
            println!("  ✗ {}", error);
        }
    }
}
