//! In-process store

use super::{newest_first, ModuleStore, StoreStats};
use crate::error::Result;
use crate::models::{
    DataSource, Module, ModuleFile, ModuleRelease, NewModule, NewModuleFile, NewRelease, Output,
    ReleaseEntry, ReleaseWithEntries, Resource, Variable, SUBMODULE_SEPARATOR,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    next_id: i64,
    modules: Vec<Module>,
    files: Vec<ModuleFile>,
    variables: Vec<(i64, Variable)>,
    outputs: Vec<(i64, Output)>,
    resources: Vec<(i64, Resource)>,
    data_sources: Vec<(i64, DataSource)>,
    releases: Vec<ModuleRelease>,
    entries: HashMap<i64, Vec<ReleaseEntry>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn module_mut(&mut self, id: i64) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.id == id)
    }

    fn clear_children(&mut self, id: i64) {
        self.files.retain(|f| f.module_id != id);
        self.variables.retain(|(m, _)| *m != id);
        self.outputs.retain(|(m, _)| *m != id);
        self.resources.retain(|(m, _)| *m != id);
        self.data_sources.retain(|(m, _)| *m != id);
    }

    fn delete(&mut self, id: i64) {
        self.clear_children(id);
        let release_ids: Vec<i64> = self
            .releases
            .iter()
            .filter(|r| r.module_id == id)
            .map(|r| r.id)
            .collect();
        for release_id in release_ids {
            self.entries.remove(&release_id);
        }
        self.releases.retain(|r| r.module_id != id);
        self.modules.retain(|m| m.id != id);
    }

    fn with_entries(&self, release: Option<&ModuleRelease>) -> Option<ReleaseWithEntries> {
        let release = release?.clone();
        let mut entries = self.entries.get(&release.id).cloned().unwrap_or_default();
        entries.sort_by_key(|e| e.order_index);
        Some(ReleaseWithEntries { release, entries })
    }

    fn entities_of<T: Clone>(items: &[(i64, T)], module_id: i64) -> Vec<T> {
        items
            .iter()
            .filter(|(m, _)| *m == module_id)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

/// [`ModuleStore`] backed by vectors behind a mutex
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn upsert_module(&self, module: &NewModule) -> Result<i64> {
        let mut state = self.state.lock().await;
        let now = Utc::now().to_rfc3339();

        if let Some(existing) = state.modules.iter_mut().find(|m| m.name == module.name) {
            existing.full_name = module.full_name.clone();
            existing.description = module.description.clone();
            existing.repo_url = module.repo_url.clone();
            existing.last_updated = module.last_updated.clone();
            existing.synced_at = now;
            existing.has_examples = false;
            return Ok(existing.id);
        }

        let id = state.next_id();
        state.modules.push(Module {
            id,
            name: module.name.clone(),
            full_name: module.full_name.clone(),
            description: module.description.clone(),
            repo_url: module.repo_url.clone(),
            provider: None,
            last_updated: module.last_updated.clone(),
            synced_at: now,
            readme: None,
            has_examples: false,
            tags: Vec::new(),
        });
        Ok(id)
    }

    async fn get_module(&self, name: &str) -> Result<Option<Module>> {
        let state = self.state.lock().await;
        Ok(state.modules.iter().find(|m| m.name == name).cloned())
    }

    async fn get_module_by_id(&self, id: i64) -> Result<Option<Module>> {
        let state = self.state.lock().await;
        Ok(state.modules.iter().find(|m| m.id == id).cloned())
    }

    async fn list_modules(&self) -> Result<Vec<Module>> {
        let state = self.state.lock().await;
        let mut modules = state.modules.clone();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(modules)
    }

    async fn update_module_readme(&self, id: i64, readme: &str) -> Result<()> {
        if let Some(module) = self.state.lock().await.module_mut(id) {
            module.readme = Some(readme.to_string());
        }
        Ok(())
    }

    async fn set_module_has_examples(&self, id: i64, has_examples: bool) -> Result<()> {
        if let Some(module) = self.state.lock().await.module_mut(id) {
            module.has_examples = has_examples;
        }
        Ok(())
    }

    async fn set_module_provider(&self, id: i64, provider: Option<&str>) -> Result<()> {
        if let Some(module) = self.state.lock().await.module_mut(id) {
            module.provider = provider.map(str::to_string);
        }
        Ok(())
    }

    async fn set_module_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        if let Some(module) = self.state.lock().await.module_mut(id) {
            module.tags = tags.to_vec();
        }
        Ok(())
    }

    async fn clear_module_children(&self, id: i64) -> Result<()> {
        self.state.lock().await.clear_children(id);
        Ok(())
    }

    async fn delete_module(&self, id: i64) -> Result<()> {
        self.state.lock().await.delete(id);
        Ok(())
    }

    async fn delete_submodules(&self, repo_name: &str) -> Result<u64> {
        let mut state = self.state.lock().await;
        let prefix = format!("{}{}", repo_name, SUBMODULE_SEPARATOR);
        let ids: Vec<i64> = state
            .modules
            .iter()
            .filter(|m| m.name.starts_with(&prefix))
            .map(|m| m.id)
            .collect();
        for id in &ids {
            state.delete(*id);
        }
        Ok(ids.len() as u64)
    }

    async fn insert_file(&self, file: &NewModuleFile) -> Result<i64> {
        let mut state = self.state.lock().await;
        state
            .files
            .retain(|f| !(f.module_id == file.module_id && f.file_path == file.file_path));
        let id = state.next_id();
        state.files.push(ModuleFile {
            id,
            module_id: file.module_id,
            file_name: file.file_name.clone(),
            file_path: file.file_path.clone(),
            file_type: file.file_type,
            content: file.content.clone(),
            size_bytes: file.size_bytes,
        });
        Ok(id)
    }

    async fn list_files(&self, module_id: i64) -> Result<Vec<ModuleFile>> {
        let state = self.state.lock().await;
        let mut files: Vec<ModuleFile> = state
            .files
            .iter()
            .filter(|f| f.module_id == module_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(files)
    }

    async fn get_file(&self, module_id: i64, path: &str) -> Result<Option<ModuleFile>> {
        let state = self.state.lock().await;
        Ok(state
            .files
            .iter()
            .find(|f| f.module_id == module_id && f.file_path == path)
            .cloned())
    }

    async fn insert_variable(&self, module_id: i64, variable: &Variable) -> Result<()> {
        self.state
            .lock()
            .await
            .variables
            .push((module_id, variable.clone()));
        Ok(())
    }

    async fn insert_output(&self, module_id: i64, output: &Output) -> Result<()> {
        self.state
            .lock()
            .await
            .outputs
            .push((module_id, output.clone()));
        Ok(())
    }

    async fn insert_resource(&self, module_id: i64, resource: &Resource) -> Result<()> {
        self.state
            .lock()
            .await
            .resources
            .push((module_id, resource.clone()));
        Ok(())
    }

    async fn insert_data_source(&self, module_id: i64, data_source: &DataSource) -> Result<()> {
        self.state
            .lock()
            .await
            .data_sources
            .push((module_id, data_source.clone()));
        Ok(())
    }

    async fn list_variables(&self, module_id: i64) -> Result<Vec<Variable>> {
        let state = self.state.lock().await;
        Ok(State::entities_of(&state.variables, module_id))
    }

    async fn list_outputs(&self, module_id: i64) -> Result<Vec<Output>> {
        let state = self.state.lock().await;
        Ok(State::entities_of(&state.outputs, module_id))
    }

    async fn list_resources(&self, module_id: i64) -> Result<Vec<Resource>> {
        let state = self.state.lock().await;
        Ok(State::entities_of(&state.resources, module_id))
    }

    async fn list_data_sources(&self, module_id: i64) -> Result<Vec<DataSource>> {
        let state = self.state.lock().await;
        Ok(State::entities_of(&state.data_sources, module_id))
    }

    async fn upsert_release(&self, release: &NewRelease) -> Result<i64> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .releases
            .iter_mut()
            .find(|r| r.module_id == release.module_id && r.version == release.version)
        {
            existing.tag = release.tag.clone();
            existing.release_date = release.release_date.clone();
            existing.previous_tag = release.previous_tag.clone();
            existing.commit_sha = release.commit_sha.clone();
            existing.previous_commit_sha = release.previous_commit_sha.clone();
            existing.comparison_url = release.comparison_url.clone();
            return Ok(existing.id);
        }

        let id = state.next_id();
        state.releases.push(ModuleRelease {
            id,
            module_id: release.module_id,
            version: release.version.clone(),
            tag: release.tag.clone(),
            release_date: release.release_date.clone(),
            previous_tag: release.previous_tag.clone(),
            commit_sha: release.commit_sha.clone(),
            previous_commit_sha: release.previous_commit_sha.clone(),
            comparison_url: release.comparison_url.clone(),
        });
        Ok(id)
    }

    async fn replace_release_entries(&self, release_id: i64, entries: &[ReleaseEntry]) -> Result<()> {
        self.state
            .lock()
            .await
            .entries
            .insert(release_id, entries.to_vec());
        Ok(())
    }

    async fn get_release_by_version(
        &self,
        module_id: i64,
        version: &str,
    ) -> Result<Option<ReleaseWithEntries>> {
        let state = self.state.lock().await;
        let release = state
            .releases
            .iter()
            .find(|r| r.module_id == module_id && r.version == version);
        Ok(state.with_entries(release))
    }

    async fn get_release_by_tag(
        &self,
        module_id: i64,
        tag: &str,
    ) -> Result<Option<ReleaseWithEntries>> {
        let state = self.state.lock().await;
        let release = state
            .releases
            .iter()
            .find(|r| r.module_id == module_id && r.tag == tag);
        Ok(state.with_entries(release))
    }

    async fn get_latest_release(&self, module_id: i64) -> Result<Option<ReleaseWithEntries>> {
        let state = self.state.lock().await;
        let release = state
            .releases
            .iter()
            .filter(|r| r.module_id == module_id)
            .min_by(|a, b| newest_first(a, b));
        Ok(state.with_entries(release))
    }

    async fn list_releases(&self, module_id: i64) -> Result<Vec<ModuleRelease>> {
        let state = self.state.lock().await;
        let mut releases: Vec<ModuleRelease> = state
            .releases
            .iter()
            .filter(|r| r.module_id == module_id)
            .cloned()
            .collect();
        releases.sort_by(newest_first);
        Ok(releases)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.lock().await;
        let submodules = state.modules.iter().filter(|m| m.is_submodule()).count();
        Ok(StoreStats {
            modules: (state.modules.len() - submodules) as i64,
            submodules: submodules as i64,
            files: state.files.len() as i64,
            variables: state.variables.len() as i64,
            outputs: state.outputs.len() as i64,
            resources: state.resources.len() as i64,
            data_sources: state.data_sources.len() as i64,
            releases: state.releases.len() as i64,
            release_entries: state.entries.values().map(|e| e.len() as i64).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::require_module;

    fn new_module(name: &str, updated: &str) -> NewModule {
        NewModule {
            name: name.to_string(),
            full_name: Some(format!("org/{}", name)),
            description: Some("desc".to_string()),
            repo_url: None,
            last_updated: updated.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_id_and_resets_examples() {
        let store = MemoryStore::new();
        let id = store.upsert_module(&new_module("m", "t1")).await.unwrap();
        store.set_module_has_examples(id, true).await.unwrap();
        store.update_module_readme(id, "# M").await.unwrap();

        let again = store.upsert_module(&new_module("m", "t2")).await.unwrap();
        assert_eq!(id, again);

        let module = store.get_module("m").await.unwrap().unwrap();
        assert_eq!(module.last_updated, "t2");
        assert!(!module.has_examples);
        assert_eq!(module.readme.as_deref(), Some("# M"));
    }

    #[tokio::test]
    async fn test_require_module_accepts_owner_prefix() {
        let store = MemoryStore::new();
        store.upsert_module(&new_module("kv", "t")).await.unwrap();
        store
            .upsert_module(&new_module("kv//modules/a", "t"))
            .await
            .unwrap();

        let dyn_store: &dyn ModuleStore = &store;
        assert_eq!(require_module(dyn_store, "kv").await.unwrap().name, "kv");
        assert_eq!(require_module(dyn_store, "org/kv").await.unwrap().name, "kv");
        assert_eq!(
            require_module(dyn_store, "kv//modules/a").await.unwrap().name,
            "kv//modules/a"
        );

        let err = require_module(dyn_store, "org/missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            require_module(dyn_store, "  ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_submodules_only_touches_children() {
        let store = MemoryStore::new();
        let root = store.upsert_module(&new_module("repo", "t")).await.unwrap();
        let child = store
            .upsert_module(&new_module("repo//modules/a", "t"))
            .await
            .unwrap();
        store
            .upsert_module(&new_module("repo-other//modules/a", "t"))
            .await
            .unwrap();
        store
            .insert_file(&NewModuleFile::new(child, "modules/a/main.tf", String::new(), 0))
            .await
            .unwrap();

        assert_eq!(store.delete_submodules("repo").await.unwrap(), 1);
        assert!(store.get_module_by_id(root).await.unwrap().is_some());
        assert!(store.get_module_by_id(child).await.unwrap().is_none());
        assert!(store.list_files(child).await.unwrap().is_empty());
        assert_eq!(store.list_modules().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_release_prefers_date_then_id() {
        let store = MemoryStore::new();
        let id = store.upsert_module(&new_module("m", "t")).await.unwrap();
        for (version, date) in [
            ("1.0.0", Some("2024-01-01")),
            ("1.2.0", Some("2024-03-01")),
            ("1.1.0", Some("2024-03-01")),
            ("0.9.0", None),
        ] {
            store
                .upsert_release(&NewRelease {
                    module_id: id,
                    version: version.to_string(),
                    tag: format!("v{}", version),
                    release_date: date.map(str::to_string),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let latest = store.get_latest_release(id).await.unwrap().unwrap();
        assert_eq!(latest.release.version, "1.1.0");

        let versions: Vec<String> = store
            .list_releases(id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec!["1.1.0", "1.2.0", "1.0.0", "0.9.0"]);
    }
}
