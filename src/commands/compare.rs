//! Compare command - files changed between two refs

use crate::error::Result;
use crate::github::ChangedFile;
use crate::sync::Syncer;

pub async fn cmd_compare(syncer: &Syncer, repo: &str, from: &str, to: &str) -> Result<Vec<ChangedFile>> {
    syncer.compare_tags(repo, from, to).await
}

pub fn print_changed_files(files: &[ChangedFile]) {
    if files.is_empty() {
        println!("No changed files.");
        return;
    }

    println!("{} changed file(s):\n", files.len());
    for file in files {
        let status = file.status.as_deref().unwrap_or("modified");
        println!(
            "  {:<10} {} (+{} -{})",
            status, file.filename, file.additions, file.deletions
        );
    }
}
