//! Configuration management for modindex
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote host access
    #[serde(default)]
    pub github: GitHubConfig,

    /// Sync pass behaviour
    #[serde(default)]
    pub sync: SyncConfig,

    /// Category learner tuning
    #[serde(default)]
    pub learner: LearnerConfig,

    /// Release/changelog handling
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Organization whose repositories are discovered
    #[serde(default = "default_org")]
    pub org: String,

    /// Environment variable name for the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Token set on the command line; never persisted
    #[serde(skip)]
    pub token_override: Option<String>,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Lifetime of cached responses in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Requests per window without a token
    #[serde(default = "default_anonymous_rate_limit")]
    pub anonymous_rate_limit: u32,

    /// Requests per window with a token
    #[serde(default = "default_authenticated_rate_limit")]
    pub authenticated_rate_limit: u32,

    /// Rate limit window in seconds; the budget refills fully once per window
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Only repositories whose name starts with this prefix are indexed
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Directory names skipped at any depth inside an archive
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// Changelog paths checked after a repository is ingested
    #[serde(default = "default_changelog_files")]
    pub changelog_files: Vec<String>,

    /// Draw a progress bar while syncing
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

/// Category learner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Vendor/ecosystem words never used as category hints
    #[serde(default = "default_ignored_words")]
    pub ignored_words: Vec<String>,
}

/// Release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Diff lines shown when no explicit limit is given
    #[serde(default = "default_context_lines")]
    pub default_context_lines: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for modindex data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            org: default_org(),
            token_env: default_token_env(),
            token_override: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            anonymous_rate_limit: default_anonymous_rate_limit(),
            authenticated_rate_limit: default_authenticated_rate_limit(),
            rate_limit_window_secs: default_rate_limit_window(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            skip_dirs: default_skip_dirs(),
            changelog_files: default_changelog_files(),
            show_progress: default_show_progress(),
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            ignored_words: default_ignored_words(),
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            default_context_lines: default_context_lines(),
        }
    }
}

impl GitHubConfig {
    /// Resolve the API token: command-line override first, then the environment
    pub fn token(&self) -> Option<String> {
        self.token_override
            .clone()
            .or_else(|| std::env::var(&self.token_env).ok())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Request budget for the current credential state
    pub fn rate_limit_for(&self, authenticated: bool) -> u32 {
        if authenticated {
            self.authenticated_rate_limit
        } else {
            self.anonymous_rate_limit
        }
    }
}

impl Config {
    /// Get the default base directory for modindex (~/.modindex)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".modindex")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("index.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("index.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if modindex is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.github.org.trim().is_empty() {
            return Err(Error::Config("github.org must not be empty".to_string()));
        }

        if self.github.anonymous_rate_limit == 0 || self.github.authenticated_rate_limit == 0 {
            return Err(Error::Config(
                "github rate limits must be positive".to_string(),
            ));
        }

        if self.github.timeout_secs == 0 {
            return Err(Error::Config(
                "github.timeout_secs must be positive".to_string(),
            ));
        }

        if self.github.cache_ttl_secs == 0 || self.github.rate_limit_window_secs == 0 {
            return Err(Error::Config(
                "github.cache_ttl_secs and github.rate_limit_window_secs must be positive"
                    .to_string(),
            ));
        }

        url::Url::parse(&self.github.api_url)?;

        if self.release.default_context_lines == 0 {
            return Err(Error::Config(
                "release.default_context_lines must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync.name_prefix, "terraform-azure-");
        assert_eq!(config.github.cache_ttl_secs, 600);
        assert_eq!(config.release.default_context_lines, 24);
        assert!(config.sync.skip_dirs.contains(&".terraform".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.github.org = "example-org".to_string();

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.github.org, "example-org");
        assert_eq!(loaded.paths.db_file, tmp.path().join("index.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[sync]\nname_prefix = \"terraform-aws-\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync.name_prefix, "terraform-aws-");
        assert_eq!(config.github.org, "cloudnationhq");
        assert_eq!(config.sync.changelog_files[0], "CHANGELOG.md");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.github.org = "  ".to_string();
        assert!(config.validate().is_err());
        config.github.org = "org".to_string();

        config.github.anonymous_rate_limit = 0;
        assert!(config.validate().is_err());
        config.github.anonymous_rate_limit = 60;

        config.release.default_context_lines = 0;
        assert!(config.validate().is_err());
        config.release.default_context_lines = 10;

        config.github.api_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_override_wins() {
        let mut config = Config::default();
        config.github.token_env = "MODINDEX_TEST_TOKEN_THAT_IS_NOT_SET".to_string();
        assert_eq!(config.github.token(), None);

        config.github.token_override = Some("abc".to_string());
        assert_eq!(config.github.token().as_deref(), Some("abc"));
        assert_eq!(config.github.rate_limit_for(true), 5000);
        assert_eq!(config.github.rate_limit_for(false), 60);
    }
}
