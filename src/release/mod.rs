//! Release metadata: changelog ingestion, lookup and patch snippets

mod changelog;
mod matcher;
mod summary;

pub use changelog::{
    extract_release_block, list_changelog_versions, normalize_version, parse_release_entries,
    slugify, version_tag, ChangelogRelease, ReleaseBlock, DEFAULT_SECTION,
};
pub use matcher::{
    locate_patch, score_candidate, select_release_entry, targets, tokenize_identifier,
    trim_patch_lines, weights, PatchMatch, Targets, DEFAULT_MAX_LINES,
};
pub use summary::{group_by_section, render_date, render_range, render_summary, ReleaseSnippet};

use crate::error::{Error, Result};
use crate::github::GitHubClient;
use crate::models::{Module, ModuleFile, NewRelease, ReleaseWithEntries};
use crate::store::{require_module, ModuleStore};
use tracing::{debug, info};

/// First stored changelog of a module, tried in the configured order
pub async fn find_changelog(
    store: &dyn ModuleStore,
    module_id: i64,
    changelog_files: &[String],
) -> Result<Option<ModuleFile>> {
    for path in changelog_files {
        if let Some(file) = store.get_file(module_id, path).await? {
            return Ok(Some(file));
        }
    }
    Ok(None)
}

fn comparison_url(module: &Module, heading: &ChangelogRelease, tag: &str, previous: Option<&str>) -> Option<String> {
    if let Some(link) = &heading.link {
        return Some(link.clone());
    }
    let repo_url = module.repo_url.as_deref()?.trim_end_matches('/');
    previous.map(|prev| format!("{}/compare/{}...{}", repo_url, prev, tag))
}

/// Store one release (`releases[index]`) and swap in its entries
async fn store_release(
    store: &dyn ModuleStore,
    module: &Module,
    changelog: &str,
    releases: &[ChangelogRelease],
    index: usize,
) -> Result<i64> {
    let heading = &releases[index];
    let tag = version_tag(&heading.version);
    let previous_tag = releases.get(index + 1).map(|r| version_tag(&r.version));

    let block = extract_release_block(changelog, &heading.version)?;
    let entries = block
        .as_ref()
        .map(|b| parse_release_entries(&b.body))
        .unwrap_or_default();

    let release_id = store
        .upsert_release(&NewRelease {
            module_id: module.id,
            version: heading.version.clone(),
            comparison_url: comparison_url(module, heading, &tag, previous_tag.as_deref()),
            tag,
            release_date: heading.date.clone(),
            previous_tag,
            commit_sha: None,
            previous_commit_sha: None,
        })
        .await?;
    store.replace_release_entries(release_id, &entries).await?;

    debug!(
        module = %module.name,
        version = %heading.version,
        entries = entries.len(),
        "Stored release"
    );
    Ok(release_id)
}

/// Store every release a changelog lists. Returns how many were stored.
pub async fn ingest_changelog(store: &dyn ModuleStore, module: &Module, changelog: &str) -> Result<usize> {
    let releases = list_changelog_versions(changelog)?;
    for index in 0..releases.len() {
        store_release(store, module, changelog, &releases, index).await?;
    }
    Ok(releases.len())
}

/// Re-ingest a single release from the module's stored changelog
pub async fn backfill_release(
    store: &dyn ModuleStore,
    module_name: &str,
    version: &str,
    changelog_files: &[String],
) -> Result<ReleaseWithEntries> {
    let version = normalize_version(version);
    if version.is_empty() {
        return Err(Error::InvalidInput("version is required".into()));
    }
    let module = require_module(store, module_name).await?;

    let changelog = find_changelog(store, module.id, changelog_files)
        .await?
        .ok_or_else(|| Error::FileNotFound {
            module: module.name.clone(),
            path: changelog_files
                .first()
                .cloned()
                .unwrap_or_else(|| "CHANGELOG.md".to_string()),
        })?;

    let releases = list_changelog_versions(&changelog.content)?;
    let index = releases
        .iter()
        .position(|r| r.version == version)
        .ok_or_else(|| Error::ReleaseNotFound {
            module: module.name.clone(),
            version: version.clone(),
        })?;

    store_release(store, &module, &changelog.content, &releases, index).await?;
    info!(module = %module.name, %version, "Backfilled release");

    let stored = store.get_release_by_version(module.id, &version).await?;
    stored.ok_or(Error::ReleaseNotFound {
        module: module.name,
        version,
    })
}

/// Find a release by version (or tag); `None`, empty or `latest` picks the newest
pub async fn lookup_release(
    store: &dyn ModuleStore,
    module_id: i64,
    version: Option<&str>,
) -> Result<Option<ReleaseWithEntries>> {
    let requested = version.map(str::trim).filter(|v| !v.is_empty());
    match requested {
        None => store.get_latest_release(module_id).await,
        Some(v) if v.eq_ignore_ascii_case("latest") => store.get_latest_release(module_id).await,
        Some(v) => {
            if let Some(found) = store
                .get_release_by_version(module_id, &normalize_version(v))
                .await?
            {
                return Ok(Some(found));
            }
            store.get_release_by_tag(module_id, &version_tag(v)).await
        }
    }
}

/// Like [`lookup_release`] with absence turned into [`Error::ReleaseNotFound`]
pub async fn require_release(
    store: &dyn ModuleStore,
    module: &Module,
    version: Option<&str>,
) -> Result<ReleaseWithEntries> {
    lookup_release(store, module.id, version)
        .await?
        .ok_or_else(|| Error::ReleaseNotFound {
            module: module.name.clone(),
            version: version.unwrap_or("latest").to_string(),
        })
}

/// Parameters for [`release_snippet`]
#[derive(Debug, Clone)]
pub struct SnippetRequest<'a> {
    pub module: &'a str,
    pub version: &'a str,
    pub query: &'a str,
    pub max_lines: usize,
    pub fallback: Option<&'a str>,
}

/// Locate and render the diff behind one changelog entry
pub async fn release_snippet(
    store: &dyn ModuleStore,
    client: &GitHubClient,
    request: &SnippetRequest<'_>,
) -> Result<ReleaseSnippet> {
    if request.query.trim().is_empty() {
        return Err(Error::InvalidInput("query is required".into()));
    }
    if request.version.trim().is_empty() {
        return Err(Error::InvalidInput("version is required".into()));
    }

    let module = require_module(store, request.module).await?;
    let found = require_release(store, &module, Some(request.version)).await?;
    let release = &found.release;

    let entry = select_release_entry(&found.entries, request.query, request.fallback)
        .ok_or_else(|| {
            Error::Other(format!(
                "No changelog entry in {} {} matches '{}'",
                module.name, release.version, request.query
            ))
        })?;

    let previous_tag = release.previous_tag.as_deref().ok_or_else(|| {
        Error::Other(format!(
            "Release {} of {} has no previous tag to compare against",
            release.tag, module.name
        ))
    })?;
    let full_name = module.full_name.as_deref().ok_or_else(|| {
        Error::Other(format!("Module {} has no repository name", module.name))
    })?;

    let comparison = client.compare(full_name, previous_tag, &release.tag).await?;
    let (filename, patch) = match locate_patch(&comparison.files, entry, request.query) {
        PatchMatch::Found { filename, patch, .. } => (filename, patch),
        PatchMatch::NoCandidate => {
            return Err(Error::Other(format!(
                "No diff between {} and {} matches '{}'",
                previous_tag, release.tag, entry.title
            )))
        }
    };

    let max_lines = if request.max_lines == 0 {
        DEFAULT_MAX_LINES
    } else {
        request.max_lines
    };
    let (patch, truncated) = trim_patch_lines(&patch, max_lines);

    Ok(ReleaseSnippet {
        module: module.name.clone(),
        version: release.version.clone(),
        title: entry.title.clone(),
        filename,
        patch,
        truncated,
        max_lines,
        comparison_url: release
            .comparison_url
            .clone()
            .or(comparison.html_url),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewModule, NewModuleFile};
    use crate::store::MemoryStore;

    const CHANGELOG: &str = "# Changelog

## [1.1.0](https://github.com/org/terraform-azure-kv/compare/v1.0.0...v1.1.0) (2024-05-01)

### Features

* add private endpoint support

## 1.0.0 (2024-03-10)

### Bug Fixes

* fix key rotation
* fix tags
";

    async fn seeded() -> (MemoryStore, Module) {
        let store = MemoryStore::new();
        let id = store
            .upsert_module(&NewModule {
                name: "terraform-azure-kv".into(),
                full_name: Some("org/terraform-azure-kv".into()),
                description: None,
                repo_url: Some("https://github.com/org/terraform-azure-kv".into()),
                last_updated: "t".into(),
            })
            .await
            .unwrap();
        let module = store.get_module_by_id(id).await.unwrap().unwrap();
        (store, module)
    }

    #[tokio::test]
    async fn test_ingest_changelog_links_previous_releases() {
        let (store, module) = seeded().await;
        assert_eq!(ingest_changelog(&store, &module, CHANGELOG).await.unwrap(), 2);

        let latest = lookup_release(&store, module.id, None).await.unwrap().unwrap();
        assert_eq!(latest.release.version, "1.1.0");
        assert_eq!(latest.release.tag, "v1.1.0");
        assert_eq!(latest.release.previous_tag.as_deref(), Some("v1.0.0"));
        assert_eq!(
            latest.release.comparison_url.as_deref(),
            Some("https://github.com/org/terraform-azure-kv/compare/v1.0.0...v1.1.0")
        );
        assert_eq!(latest.entries.len(), 1);

        let oldest = lookup_release(&store, module.id, Some("v1.0.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(oldest.release.previous_tag, None);
        assert_eq!(oldest.release.comparison_url, None);
        assert_eq!(oldest.entries.len(), 2);
        assert_eq!(oldest.entries[1].title, "fix tags");
    }

    #[tokio::test]
    async fn test_reingest_replaces_entries() {
        let (store, module) = seeded().await;
        ingest_changelog(&store, &module, CHANGELOG).await.unwrap();
        ingest_changelog(&store, &module, CHANGELOG).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.release_entries, 3);
    }

    #[tokio::test]
    async fn test_backfill_release() {
        let (store, module) = seeded().await;
        let files = crate::config::default_changelog_files();

        let err = backfill_release(&store, "terraform-azure-kv", "1.0.0", &files)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));

        store
            .insert_file(&NewModuleFile::new(
                module.id,
                "CHANGELOG.md",
                CHANGELOG.to_string(),
                CHANGELOG.len() as i64,
            ))
            .await
            .unwrap();

        let release = backfill_release(&store, "org/terraform-azure-kv", "v1.0.0", &files)
            .await
            .unwrap();
        assert_eq!(release.release.version, "1.0.0");
        assert_eq!(release.entries.len(), 2);
        assert_eq!(store.stats().await.unwrap().releases, 1);

        let err = backfill_release(&store, "terraform-azure-kv", "3.0.0", &files)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReleaseNotFound { .. }));
    }

    #[tokio::test]
    async fn test_require_release_reports_not_found() {
        let (store, module) = seeded().await;
        let err = require_release(&store, &module, Some("9.9.9")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
