//! Default values for configuration

/// Default GitHub REST API base URL
pub fn default_api_url() -> String {
    std::env::var("MODINDEX_GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string())
}

/// Default GitHub organization to discover modules in
pub fn default_org() -> String {
    "cloudnationhq".to_string()
}

/// Default environment variable holding the GitHub token
pub fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("modindex/{} (Terraform Module Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout in seconds
pub fn default_timeout() -> u64 {
    30
}

/// Default response cache TTL (10 minutes)
pub fn default_cache_ttl() -> u64 {
    600
}

/// Default request budget without a token
pub fn default_anonymous_rate_limit() -> u32 {
    60
}

/// Default request budget with a token
pub fn default_authenticated_rate_limit() -> u32 {
    5000
}

/// Default rate limit window (1 hour)
pub fn default_rate_limit_window() -> u64 {
    3600
}

/// Default repository name prefix for module repositories
pub fn default_name_prefix() -> String {
    "terraform-azure-".to_string()
}

/// Default directories skipped during archive ingestion
pub fn default_skip_dirs() -> Vec<String> {
    [".git", ".github", "node_modules", ".terraform"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default changelog locations, in lookup order
pub fn default_changelog_files() -> Vec<String> {
    ["CHANGELOG.md", "changelog.md", "docs/CHANGELOG.md", "docs/changelog.md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default: show a progress bar during sync
pub fn default_show_progress() -> bool {
    true
}

/// Default generic words the category learner never treats as categories
pub fn default_ignored_words() -> Vec<String> {
    ["terraform", "azure", "azurerm", "module", "modules"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default number of diff lines shown for a release snippet
pub fn default_context_lines() -> usize {
    24
}
