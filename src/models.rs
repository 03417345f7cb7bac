//! Indexed records: modules, their files and structural entities, and releases

use crate::error::Error;
use crate::hcl::Value;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator between a repository name and a submodule path in a module name
pub const SUBMODULE_SEPARATOR: &str = "//modules/";

/// Build the virtual module name for `modules/<sub>` inside `repo`
pub fn submodule_name(repo: &str, sub: &str) -> String {
    format!("{}{}{}", repo, SUBMODULE_SEPARATOR, sub)
}

/// Coarse file classification used when persisting archive content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Terraform,
    Markdown,
    Yaml,
    Json,
    Other,
}

impl FileType {
    /// Classify by file name suffix
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".tf") {
            FileType::Terraform
        } else if lower.ends_with(".md") {
            FileType::Markdown
        } else if lower.ends_with(".yml") || lower.ends_with(".yaml") {
            FileType::Yaml
        } else if lower.ends_with(".json") {
            FileType::Json
        } else {
            FileType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Terraform => "terraform",
            FileType::Markdown => "markdown",
            FileType::Yaml => "yaml",
            FileType::Json => "json",
            FileType::Other => "other",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terraform" => Ok(FileType::Terraform),
            "markdown" => Ok(FileType::Markdown),
            "yaml" => Ok(FileType::Yaml),
            "json" => Ok(FileType::Json),
            "other" => Ok(FileType::Other),
            _ => Err(Error::Other(format!("Unknown file type: {}", s))),
        }
    }
}

/// An indexed module (a repository root or one of its `modules/<name>` directories)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub repo_url: Option<String>,
    pub provider: Option<String>,
    /// Opaque freshness marker from the remote; compared verbatim
    pub last_updated: String,
    pub synced_at: String,
    pub readme: Option<String>,
    pub has_examples: bool,
    pub tags: Vec<String>,
}

impl Module {
    pub fn is_submodule(&self) -> bool {
        self.name.contains(SUBMODULE_SEPARATOR)
    }

    /// Name used when talking to the remote host: `owner/name` when known
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }
}

/// Fields written by a module upsert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewModule {
    pub name: String,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub repo_url: Option<String>,
    pub last_updated: String,
}

/// A file persisted under a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFile {
    pub id: i64,
    pub module_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
    pub content: String,
    pub size_bytes: i64,
}

/// A file about to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewModuleFile {
    pub module_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
    pub content: String,
    pub size_bytes: i64,
}

impl NewModuleFile {
    pub fn new(module_id: i64, file_path: &str, content: String, size_bytes: i64) -> Self {
        let file_name = file_path.rsplit('/').next().unwrap_or(file_path).to_string();
        Self {
            module_id,
            file_type: FileType::from_file_name(&file_name),
            file_name,
            file_path: file_path.to_string(),
            content,
            size_bytes,
        }
    }
}

/// A `variable` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Type constraint as written in the source
    pub var_type: Option<String>,
    pub description: Option<String>,
    /// Default expression as written in the source
    pub default_text: Option<String>,
    /// Default expression when it is statically known
    pub default_value: Option<Value>,
    pub required: bool,
    pub sensitive: bool,
    pub source_file: String,
}

/// An `output` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub description: Option<String>,
    pub sensitive: bool,
    pub source_file: String,
}

/// A `resource` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: String,
    pub resource_name: String,
    pub provider: String,
    pub source_file: String,
}

/// A `data` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub data_type: String,
    pub data_name: String,
    pub provider: String,
    pub source_file: String,
}

/// Provider of a resource or data source type: everything before the first underscore
pub fn provider_from_type(full_type: &str) -> String {
    full_type.split('_').next().unwrap_or_default().to_string()
}

/// A module release, derived from its changelog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRelease {
    pub id: i64,
    pub module_id: i64,
    pub version: String,
    pub tag: String,
    pub release_date: Option<String>,
    pub previous_tag: Option<String>,
    pub commit_sha: Option<String>,
    pub previous_commit_sha: Option<String>,
    pub comparison_url: Option<String>,
}

/// Fields written by a release upsert (keyed by module + version)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRelease {
    pub module_id: i64,
    pub version: String,
    pub tag: String,
    pub release_date: Option<String>,
    pub previous_tag: Option<String>,
    pub commit_sha: Option<String>,
    pub previous_commit_sha: Option<String>,
    pub comparison_url: Option<String>,
}

/// One bullet from a release's notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub section: String,
    pub entry_key: String,
    pub title: String,
    pub order_index: i64,
    pub identifier: Option<String>,
}

/// A release together with its entries in original order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseWithEntries {
    pub release: ModuleRelease,
    pub entries: Vec<ReleaseEntry>,
}
