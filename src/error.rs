//! Custom error types for modindex

use thiserror::Error;

/// Main error type for modindex operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Repository content unavailable (HTTP {status}): {url}")]
    ContentUnavailable { status: u16, url: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Module '{0}' not found; run 'modindex sync' first")]
    ModuleNotFound(String),

    #[error("No release metadata found for {module} {version}; run 'modindex update' first")]
    ReleaseNotFound { module: String, version: String },

    #[error("File '{path}' not found in module {module}; run 'modindex sync' first")]
    FileNotFound { module: String, path: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not initialized: run 'modindex init' first")]
    NotInitialized,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for lookups that failed because the record is absent from the index
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ModuleNotFound(_) | Error::ReleaseNotFound { .. } | Error::FileNotFound { .. }
        )
    }

    /// True when the remote host reported the repository content cannot be served
    pub fn is_content_unavailable(&self) -> bool {
        matches!(self, Error::ContentUnavailable { .. })
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for modindex
pub type Result<T> = std::result::Result<T, Error>;
