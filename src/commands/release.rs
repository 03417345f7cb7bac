//! Release commands - show, backfill and snippet

use crate::config::Config;
use crate::error::Result;
use crate::github::GitHubClient;
use crate::models::ReleaseWithEntries;
use crate::release::{
    backfill_release, release_snippet, render_summary, require_release, ReleaseSnippet,
    SnippetRequest,
};
use crate::store::{require_module, ModuleStore};
use serde::{Deserialize, Serialize};

/// A release together with the module it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseView {
    pub module: String,
    #[serde(flatten)]
    pub release: ReleaseWithEntries,
}

impl ReleaseView {
    pub fn summary(&self) -> String {
        render_summary(&self.module, &self.release.release, &self.release.entries)
    }
}

/// A release by version, or the latest one
pub async fn cmd_release_show(
    store: &dyn ModuleStore,
    module: &str,
    version: Option<&str>,
) -> Result<ReleaseView> {
    let module = require_module(store, module).await?;
    let release = require_release(store, &module, version).await?;
    Ok(ReleaseView {
        module: module.name,
        release,
    })
}

/// Re-ingest one release from the stored changelog
pub async fn cmd_release_backfill(
    config: &Config,
    store: &dyn ModuleStore,
    module: &str,
    version: &str,
) -> Result<ReleaseView> {
    let module = require_module(store, module).await?;
    let release = backfill_release(store, &module.name, version, &config.sync.changelog_files).await?;
    Ok(ReleaseView {
        module: module.name,
        release,
    })
}

/// Diff snippet behind a changelog entry; a zero line limit uses the configured context
pub async fn cmd_release_snippet(
    config: &Config,
    store: &dyn ModuleStore,
    client: &GitHubClient,
    mut request: SnippetRequest<'_>,
) -> Result<ReleaseSnippet> {
    if request.max_lines == 0 {
        request.max_lines = config.release.default_context_lines;
    }
    release_snippet(store, client, &request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewModule;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_show_latest_release() {
        let store = MemoryStore::new();
        let id = store
            .upsert_module(&NewModule {
                name: "terraform-azure-kv".into(),
                full_name: Some("org/terraform-azure-kv".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let module = store.get_module_by_id(id).await.unwrap().unwrap();
        crate::release::ingest_changelog(
            &store,
            &module,
            "## 1.1.0 (2024-05-01)\n\n### Features\n\n* add x\n\n## 1.0.0 (2024-03-01)\n\n* init\n",
        )
        .await
        .unwrap();

        let view = cmd_release_show(&store, "org/terraform-azure-kv", None).await.unwrap();
        assert_eq!(view.module, "terraform-azure-kv");
        assert_eq!(view.release.release.version, "1.1.0");
        let summary = view.summary();
        assert!(summary.contains("- Range: v1.0.0 → v1.1.0"));
        assert!(summary.contains("- Date: May 1, 2024"));
        assert!(summary.contains("    - add x"));

        let missing = cmd_release_show(&store, "terraform-azure-kv", Some("2.0.0")).await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
