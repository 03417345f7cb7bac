//! Repository synchronization
//!
//! A pass discovers the organization's eligible repositories and rebuilds
//! each one from its tarball: module record, README, files, submodules,
//! structural entities, provider and changelog releases. Repositories are
//! handled one at a time; a failing repository is recorded in
//! [`SyncProgress::errors`] and the pass moves on.

mod archive;

pub use archive::{normalize_archive_path, read_archive, should_skip_path, submodule_key, ArchiveEntry};

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{detect_module_provider, extract_file};
use crate::github::{filter_eligible, ChangedFile, GitHubClient, Repository};
use crate::learn::{CategoryLearner, ModuleProfile};
use crate::models::{submodule_name, FileType, NewModule, NewModuleFile, Resource};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::release::{find_changelog, ingest_changelog};
use crate::store::ModuleStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Eligible repositories discovered
    pub total_repos: usize,
    pub processed_repos: usize,
    /// Unchanged (incremental) or without retrievable content
    pub skipped_repos: usize,
    pub errors: Vec<String>,
    /// Repositories re-synced by an incremental pass
    pub updated_repos: Vec<String>,
    /// The pass stopped early on request
    pub cancelled: bool,
}

impl SyncProgress {
    pub fn succeeded(&self) -> usize {
        self.processed_repos
            .saturating_sub(self.errors.len())
            .saturating_sub(self.skipped_repos)
    }
}

/// Outcome of a categorization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub modules_tagged: usize,
    /// Distinct resource types the learner saw
    pub resource_types: usize,
    pub clusters: usize,
}

enum RepoOutcome {
    Synced,
    Unavailable,
}

/// Drives full and incremental passes against a [`ModuleStore`]
pub struct Syncer {
    store: Arc<dyn ModuleStore>,
    client: GitHubClient,
    config: Config,
    cancel: CancellationToken,
}

impl Syncer {
    pub fn new(store: Arc<dyn ModuleStore>, client: GitHubClient, config: Config) -> Self {
        Self {
            store,
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<dyn ModuleStore> {
        &self.store
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Re-sync every eligible repository
    pub async fn sync_all(&self) -> Result<SyncProgress> {
        info!(org = %self.config.github.org, "Starting full sync");
        let repos = self.discover().await?;
        self.run_pass(repos, false).await
    }

    /// Re-sync repositories whose remote `updated_at` differs from the stored one
    pub async fn sync_updates(&self) -> Result<SyncProgress> {
        info!(org = %self.config.github.org, "Starting incremental sync");
        self.client.clear_cache();
        let repos = self.discover().await?;
        self.run_pass(repos, true).await
    }

    /// Files changed between two refs of `owner/repo`
    pub async fn compare_tags(&self, full_name: &str, from: &str, to: &str) -> Result<Vec<ChangedFile>> {
        let full_name = full_name.trim();
        let (owner, repo) = full_name
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("expected owner/repo, got '{}'", full_name)))?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(Error::InvalidInput(format!(
                "expected owner/repo, got '{}'",
                full_name
            )));
        }
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return Err(Error::InvalidInput("both refs are required".into()));
        }

        Ok(self.client.compare(full_name, from, to).await?.files)
    }

    async fn discover(&self) -> Result<Vec<Repository>> {
        let repos = self.client.list_org_repos(&self.config.github.org).await?;
        let listed = repos.len();
        let eligible = filter_eligible(repos, &self.config.sync.name_prefix);
        info!(listed, eligible = eligible.len(), "Discovered repositories");
        Ok(eligible)
    }

    async fn run_pass(&self, repos: Vec<Repository>, incremental: bool) -> Result<SyncProgress> {
        let mut progress = SyncProgress {
            total_repos: repos.len(),
            ..Default::default()
        };
        let bar = if self.config.sync.show_progress {
            start_progress_bar(repos.len(), "Syncing repositories")
        } else {
            None
        };

        for repo in &repos {
            if self.cancel.is_cancelled() {
                warn!(
                    processed = progress.processed_repos,
                    total = progress.total_repos,
                    "Sync cancelled"
                );
                progress.cancelled = true;
                break;
            }

            if incremental {
                if let Some(existing) = self.store.get_module(&repo.name).await? {
                    if existing.last_updated == repo.updated_at {
                        debug!(repo = %repo.name, "Already up to date");
                        progress.skipped_repos += 1;
                        progress.processed_repos += 1;
                        advance_progress(&bar, &repo.name);
                        continue;
                    }
                    debug!(
                        repo = %repo.name,
                        stored = %existing.last_updated,
                        remote = %repo.updated_at,
                        "Repository changed"
                    );
                }
            }

            info!(
                repo = %repo.name,
                position = progress.processed_repos + 1,
                total = progress.total_repos,
                "Syncing repository"
            );
            match self.sync_repository(repo).await {
                Ok(RepoOutcome::Synced) => {
                    if incremental {
                        progress.updated_repos.push(repo.name.clone());
                    }
                }
                Ok(RepoOutcome::Unavailable) => progress.skipped_repos += 1,
                Err(e) => {
                    let message = format!("Failed to sync {}: {}", repo.name, e);
                    warn!(repo = %repo.name, error = %e, "Repository sync failed");
                    progress.errors.push(message);
                    self.mark_stale(repo).await;
                }
            }
            progress.processed_repos += 1;
            advance_progress(&bar, &repo.name);
        }

        finish_progress(bar, "Sync finished");
        info!(
            synced = progress.succeeded(),
            total = progress.total_repos,
            skipped = progress.skipped_repos,
            errors = progress.errors.len(),
            "Sync completed"
        );
        Ok(progress)
    }

    /// Clear the freshness marker so the next incremental pass retries the repository
    async fn mark_stale(&self, repo: &Repository) {
        if let Ok(Some(_)) = self.store.get_module(&repo.name).await {
            let module = NewModule {
                last_updated: String::new(),
                ..new_module(repo)
            };
            if let Err(e) = self.store.upsert_module(&module).await {
                warn!(repo = %repo.name, error = %e, "Failed to reset freshness marker");
            }
        }
    }

    async fn sync_repository(&self, repo: &Repository) -> Result<RepoOutcome> {
        let existed = self.store.get_module(&repo.name).await?.is_some();
        let module_id = self.store.upsert_module(&new_module(repo)).await?;
        if existed {
            self.store.clear_module_children(module_id).await?;
        }

        match self.client.fetch_readme(&repo.full_name).await {
            Ok(readme) => self.store.update_module_readme(module_id, &readme).await?,
            Err(e) => warn!(repo = %repo.name, error = %e, "Failed to fetch README"),
        }

        let removed = self.store.delete_submodules(&repo.name).await?;
        if removed > 0 {
            debug!(repo = %repo.name, removed, "Removed previous submodules");
        }

        let tarball = match self.client.fetch_tarball(&repo.full_name).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_content_unavailable() => {
                info!(repo = %repo.name, "Repository content unavailable, skipping");
                self.store.delete_module(module_id).await?;
                return Ok(RepoOutcome::Unavailable);
            }
            Err(e) => return Err(e),
        };

        let files = read_archive(&tarball, &self.config.sync.skip_dirs)?;
        let mut submodules: BTreeMap<String, i64> = BTreeMap::new();
        let mut has_examples = false;

        for file in files {
            let target = match submodule_key(&file.path) {
                Some(key) => match submodules.get(key) {
                    Some(id) => *id,
                    None => {
                        let id = self.ensure_submodule(repo, key).await?;
                        submodules.insert(key.to_string(), id);
                        id
                    }
                },
                None => module_id,
            };
            if file.path.starts_with("examples/") {
                has_examples = true;
            }
            self.store
                .insert_file(&NewModuleFile::new(target, &file.path, file.content, file.size))
                .await?;
        }

        self.index_module(module_id, None).await?;
        for (key, id) in &submodules {
            self.index_module(*id, Some(key)).await?;
        }

        if has_examples {
            self.store.set_module_has_examples(module_id, true).await?;
        }

        self.ingest_releases(module_id).await;
        debug!(
            repo = %repo.name,
            submodules = submodules.len(),
            has_examples,
            "Repository synced"
        );
        Ok(RepoOutcome::Synced)
    }

    async fn ensure_submodule(&self, repo: &Repository, key: &str) -> Result<i64> {
        let module = NewModule {
            name: submodule_name(&repo.name, key),
            description: Some(format!("Submodule {} of {}", key, repo.name)),
            ..new_module(repo)
        };
        let id = self.store.upsert_module(&module).await?;
        self.store.clear_module_children(id).await?;
        debug!(module = %module.name, "Created submodule");
        Ok(id)
    }

    /// Extract entities from every stored configuration file of a module and
    /// record its provider. Unparseable files are logged and skipped.
    async fn index_module(&self, module_id: i64, submodule: Option<&str>) -> Result<()> {
        let files = self.store.list_files(module_id).await?;
        let prefix = submodule.map(|key| format!("modules/{}/", key));
        let mut resources: Vec<Resource> = Vec::new();
        let mut sources: Vec<(String, &str)> = Vec::new();

        for file in files.iter().filter(|f| f.file_type == FileType::Terraform) {
            let relative = match &prefix {
                Some(p) => file.file_path.strip_prefix(p.as_str()).unwrap_or(&file.file_path),
                None => file.file_path.as_str(),
            };
            sources.push((relative.to_string(), file.content.as_str()));

            let entities = match extract_file(&file.content, &file.file_name) {
                Ok(entities) => entities,
                Err(e) => {
                    warn!(path = %file.file_path, error = %e, "Skipping unparseable file");
                    continue;
                }
            };
            if entities.is_empty() {
                continue;
            }
            for variable in &entities.variables {
                self.store.insert_variable(module_id, variable).await?;
            }
            for output in &entities.outputs {
                self.store.insert_output(module_id, output).await?;
            }
            for resource in &entities.resources {
                self.store.insert_resource(module_id, resource).await?;
            }
            for data_source in &entities.data_sources {
                self.store.insert_data_source(module_id, data_source).await?;
            }
            resources.extend(entities.resources);
        }

        let named: Vec<(&str, &str)> = sources.iter().map(|(n, c)| (n.as_str(), *c)).collect();
        let provider = detect_module_provider(&named, &resources);
        self.store
            .set_module_provider(module_id, provider.as_deref())
            .await?;
        Ok(())
    }

    async fn ingest_releases(&self, module_id: i64) {
        match self.load_changelog_releases(module_id).await {
            Ok(0) => {}
            Ok(count) => debug!(module_id, releases = count, "Ingested changelog"),
            Err(e) => warn!(module_id, error = %e, "Failed to ingest changelog"),
        }
    }

    async fn load_changelog_releases(&self, module_id: i64) -> Result<usize> {
        let store = self.store.as_ref();
        let Some(module) = store.get_module_by_id(module_id).await? else {
            return Ok(0);
        };
        match find_changelog(store, module_id, &self.config.sync.changelog_files).await? {
            Some(changelog) => ingest_changelog(store, &module, &changelog.content).await,
            None => Ok(0),
        }
    }

    /// Retrain the category learner over every stored module and rewrite all tags.
    ///
    /// Fails with [`Error::Cancelled`] when cancellation is requested before
    /// any tag is written; a pass that started writing runs to completion.
    pub async fn rebuild_categories(&self) -> Result<IndexStats> {
        self.cancel.check()?;
        let modules = self.store.list_modules().await?;
        let mut profiles = Vec::with_capacity(modules.len());

        for module in &modules {
            self.cancel.check()?;
            let mut resource_types: Vec<String> = Vec::new();
            for resource in self.store.list_resources(module.id).await? {
                if !resource_types.contains(&resource.resource_type) {
                    resource_types.push(resource.resource_type);
                }
            }
            profiles.push(ModuleProfile {
                name: module.name.clone(),
                description: module.description.clone().unwrap_or_default(),
                provider: module.provider.clone(),
                resource_types,
            });
        }

        let learner = CategoryLearner::train(&self.config.learner.ignored_words, &profiles);
        for (module, profile) in modules.iter().zip(&profiles) {
            let tags = learner.categorize(profile);
            self.store.set_module_tags(module.id, &tags).await?;
        }

        let stats = IndexStats {
            modules_tagged: modules.len(),
            resource_types: learner.resource_type_count(),
            clusters: learner.cluster_count(),
        };
        info!(
            modules = stats.modules_tagged,
            resource_types = stats.resource_types,
            clusters = stats.clusters,
            "Categories rebuilt"
        );
        Ok(stats)
    }
}

fn new_module(repo: &Repository) -> NewModule {
    NewModule {
        name: repo.name.clone(),
        full_name: Some(repo.full_name.clone()),
        description: repo.description.clone(),
        repo_url: Some(repo.html_url.clone()).filter(|u| !u.is_empty()),
        last_updated: repo.updated_at.clone(),
    }
}
