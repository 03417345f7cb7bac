//! Persistence interface for indexed modules
//!
//! The sync pipeline talks to storage only through [`ModuleStore`]. The
//! SQLite-backed [`crate::meta::MetaDb`] is used by the CLI; [`MemoryStore`]
//! keeps everything in process for tests and dry runs.

mod memory;

pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::models::{
    DataSource, Module, ModuleFile, ModuleRelease, NewModule, NewModuleFile, NewRelease, Output,
    ReleaseEntry, ReleaseWithEntries, Resource, Variable, SUBMODULE_SEPARATOR,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Row counts across the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub modules: i64,
    pub submodules: i64,
    pub files: i64,
    pub variables: i64,
    pub outputs: i64,
    pub resources: i64,
    pub data_sources: i64,
    pub releases: i64,
    pub release_entries: i64,
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
    // ===== Modules =====

    /// Insert or update by name, returning the module id. Re-syncing resets
    /// the has-examples flag; README, provider and tags are kept.
    async fn upsert_module(&self, module: &NewModule) -> Result<i64>;

    async fn get_module(&self, name: &str) -> Result<Option<Module>>;

    async fn get_module_by_id(&self, id: i64) -> Result<Option<Module>>;

    /// All modules ordered by name
    async fn list_modules(&self) -> Result<Vec<Module>>;

    async fn update_module_readme(&self, id: i64, readme: &str) -> Result<()>;

    async fn set_module_has_examples(&self, id: i64, has_examples: bool) -> Result<()>;

    async fn set_module_provider(&self, id: i64, provider: Option<&str>) -> Result<()>;

    async fn set_module_tags(&self, id: i64, tags: &[String]) -> Result<()>;

    /// Remove files and structural entities of a module, keeping the module
    async fn clear_module_children(&self, id: i64) -> Result<()>;

    /// Remove a module with everything it owns
    async fn delete_module(&self, id: i64) -> Result<()>;

    /// Remove every `<repo>//modules/*` module, returning how many went
    async fn delete_submodules(&self, repo_name: &str) -> Result<u64>;

    // ===== Files and entities =====

    /// Insert a file, replacing any file at the same path in the module
    async fn insert_file(&self, file: &NewModuleFile) -> Result<i64>;

    /// Files of a module ordered by path
    async fn list_files(&self, module_id: i64) -> Result<Vec<ModuleFile>>;

    async fn get_file(&self, module_id: i64, path: &str) -> Result<Option<ModuleFile>>;

    async fn insert_variable(&self, module_id: i64, variable: &Variable) -> Result<()>;

    async fn insert_output(&self, module_id: i64, output: &Output) -> Result<()>;

    async fn insert_resource(&self, module_id: i64, resource: &Resource) -> Result<()>;

    async fn insert_data_source(&self, module_id: i64, data_source: &DataSource) -> Result<()>;

    async fn list_variables(&self, module_id: i64) -> Result<Vec<Variable>>;

    async fn list_outputs(&self, module_id: i64) -> Result<Vec<Output>>;

    async fn list_resources(&self, module_id: i64) -> Result<Vec<Resource>>;

    async fn list_data_sources(&self, module_id: i64) -> Result<Vec<DataSource>>;

    // ===== Releases =====

    /// Insert or update by module and version, returning the release id
    async fn upsert_release(&self, release: &NewRelease) -> Result<i64>;

    /// Atomically swap all entries of a release
    async fn replace_release_entries(&self, release_id: i64, entries: &[ReleaseEntry]) -> Result<()>;

    async fn get_release_by_version(
        &self,
        module_id: i64,
        version: &str,
    ) -> Result<Option<ReleaseWithEntries>>;

    async fn get_release_by_tag(&self, module_id: i64, tag: &str)
        -> Result<Option<ReleaseWithEntries>>;

    /// Release with the greatest date, most recently stored first on ties
    async fn get_latest_release(&self, module_id: i64) -> Result<Option<ReleaseWithEntries>>;

    /// Releases of a module, newest first
    async fn list_releases(&self, module_id: i64) -> Result<Vec<ModuleRelease>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Resolve a module by name, accepting `owner/name` for root modules
pub async fn require_module(store: &dyn ModuleStore, name: &str) -> Result<Module> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("module name is required".into()));
    }
    if let Some(module) = store.get_module(name).await? {
        return Ok(module);
    }
    if !name.contains(SUBMODULE_SEPARATOR) {
        if let Some((_, repo)) = name.split_once('/').filter(|(_, r)| !r.contains('/')) {
            if let Some(module) = store.get_module(repo).await? {
                return Ok(module);
            }
        }
    }
    Err(Error::ModuleNotFound(name.to_string()))
}

/// Order releases newest first: by date, then by id
pub(crate) fn newest_first(a: &ModuleRelease, b: &ModuleRelease) -> std::cmp::Ordering {
    let date_a = a.release_date.as_deref().unwrap_or_default();
    let date_b = b.release_date.as_deref().unwrap_or_default();
    date_b.cmp(date_a).then_with(|| b.id.cmp(&a.id))
}
