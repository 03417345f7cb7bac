//! SQLite schema definition

/// SQL schema for the index database
pub const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

-- Modules: one per repository plus one per discovered submodule
CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    full_name TEXT,
    description TEXT,
    repo_url TEXT,
    provider TEXT,
    last_updated TEXT NOT NULL DEFAULT '',
    synced_at TEXT NOT NULL,
    readme TEXT,
    has_examples INTEGER NOT NULL DEFAULT 0,
    tags_json TEXT NOT NULL DEFAULT '[]'
);

-- Files: archive content attributed to a module
CREATE TABLE IF NOT EXISTS module_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_type TEXT NOT NULL,
    content TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    UNIQUE(module_id, file_path)
);

CREATE TABLE IF NOT EXISTS module_variables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    var_type TEXT,
    description TEXT,
    default_text TEXT,
    default_json TEXT,
    required INTEGER NOT NULL DEFAULT 1,
    sensitive INTEGER NOT NULL DEFAULT 0,
    source_file TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS module_outputs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    sensitive INTEGER NOT NULL DEFAULT 0,
    source_file TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS module_resources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    resource_type TEXT NOT NULL,
    resource_name TEXT NOT NULL,
    provider TEXT NOT NULL,
    source_file TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS module_data_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    data_type TEXT NOT NULL,
    data_name TEXT NOT NULL,
    provider TEXT NOT NULL,
    source_file TEXT NOT NULL DEFAULT ''
);

-- Releases: derived from changelogs
CREATE TABLE IF NOT EXISTS module_releases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    version TEXT NOT NULL,
    tag TEXT NOT NULL,
    release_date TEXT,
    previous_tag TEXT,
    commit_sha TEXT,
    previous_commit_sha TEXT,
    comparison_url TEXT,
    UNIQUE(module_id, version)
);

CREATE TABLE IF NOT EXISTS module_release_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    release_id INTEGER NOT NULL REFERENCES module_releases(id) ON DELETE CASCADE,
    section TEXT NOT NULL,
    entry_key TEXT NOT NULL,
    title TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    identifier TEXT,
    UNIQUE(release_id, entry_key)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_files_module ON module_files(module_id);
CREATE INDEX IF NOT EXISTS idx_variables_module ON module_variables(module_id);
CREATE INDEX IF NOT EXISTS idx_outputs_module ON module_outputs(module_id);
CREATE INDEX IF NOT EXISTS idx_resources_module ON module_resources(module_id);
CREATE INDEX IF NOT EXISTS idx_resources_type ON module_resources(resource_type);
CREATE INDEX IF NOT EXISTS idx_data_sources_module ON module_data_sources(module_id);
CREATE INDEX IF NOT EXISTS idx_releases_module ON module_releases(module_id);
CREATE INDEX IF NOT EXISTS idx_entries_release ON module_release_entries(release_id);
"#;
