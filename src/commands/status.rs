//! Status and module listing commands

use crate::config::Config;
use crate::error::Result;
use crate::github::GitHubClient;
use crate::store::{ModuleStore, StoreStats};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub api_url: String,
    pub org: String,
    pub name_prefix: String,
    pub authenticated: bool,
    /// Requests left in this process's rate-limit window
    pub remaining_requests: u32,
    pub stats: StoreStats,
}

/// Get system status
pub async fn cmd_status(
    config: &Config,
    store: &dyn ModuleStore,
    client: &GitHubClient,
) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        api_url: client.api_url().to_string(),
        org: config.github.org.clone(),
        name_prefix: config.sync.name_prefix.clone(),
        authenticated: client.is_authenticated(),
        remaining_requests: client.remaining_requests().await,
        stats: store.stats().await?,
    })
}

pub fn print_status(status: &StatusInfo) {
    println!("modindex Status\n");
    println!("Config:       {}", status.config_path);
    println!("Database:     {}", status.db_path);
    println!("Organization: {} (prefix '{}')", status.org, status.name_prefix);
    println!("GitHub API:   {}", status.api_url);
    println!(
        "GitHub auth:  {} ({} requests left)",
        if status.authenticated { "token" } else { "anonymous" },
        status.remaining_requests
    );

    let s = &status.stats;
    println!("\nIndex:");
    println!("  Modules:      {} ({} submodules)", s.modules, s.submodules);
    println!("  Files:        {}", s.files);
    println!("  Variables:    {}", s.variables);
    println!("  Outputs:      {}", s.outputs);
    println!("  Resources:    {}", s.resources);
    println!("  Data sources: {}", s.data_sources);
    println!("  Releases:     {} ({} entries)", s.releases, s.release_entries);
}

/// One row of the module listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    pub provider: Option<String>,
    pub tags: Vec<String>,
    pub has_examples: bool,
    pub last_updated: String,
}

/// List indexed modules with their tags
pub async fn cmd_list_modules(store: &dyn ModuleStore) -> Result<Vec<ModuleSummary>> {
    Ok(store
        .list_modules()
        .await?
        .into_iter()
        .map(|m| ModuleSummary {
            name: m.name,
            provider: m.provider,
            tags: m.tags,
            has_examples: m.has_examples,
            last_updated: m.last_updated,
        })
        .collect())
}

pub fn print_modules(modules: &[ModuleSummary]) {
    if modules.is_empty() {
        println!("No modules indexed. Run 'modindex sync' first.");
        return;
    }

    for module in modules {
        let tags = if module.tags.is_empty() {
            "-".to_string()
        } else {
            module.tags.join(", ")
        };
        println!(
            "{}{}  [{}]",
            module.name,
            if module.has_examples { " (examples)" } else { "" },
            tags
        );
    }
    println!("\n{} module(s)", modules.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::models::NewModule;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_status_and_listing() {
        let store = MemoryStore::new();
        let id = store
            .upsert_module(&NewModule {
                name: "terraform-azure-kv".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .set_module_tags(id, &["vault".to_string(), "azurerm".to_string()])
            .await
            .unwrap();

        let mut config = Config::default();
        config.github = GitHubConfig {
            api_url: "http://127.0.0.1:9/".to_string(),
            token_env: "MODINDEX_TEST_UNSET_TOKEN".to_string(),
            anonymous_rate_limit: 7,
            ..GitHubConfig::default()
        };
        let client = GitHubClient::new(&config.github).unwrap();

        let status = cmd_status(&config, &store, &client).await.unwrap();
        assert_eq!(status.stats.modules, 1);
        assert_eq!(status.api_url, "http://127.0.0.1:9");
        assert!(!status.authenticated);
        assert_eq!(status.remaining_requests, 7);

        config.github.token_override = Some("ghp_test".to_string());
        let client = GitHubClient::new(&config.github).unwrap();
        let status = cmd_status(&config, &store, &client).await.unwrap();
        assert!(status.authenticated);
        assert_eq!(status.remaining_requests, config.github.authenticated_rate_limit);

        let modules = cmd_list_modules(&store).await.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].tags, vec!["vault", "azurerm"]);
    }
}
