//! Index storage using SQLite
//!
//! This module handles all local storage of the index:
//! - Modules and submodules
//! - Archive files and the structural entities extracted from them
//! - Releases and their changelog entries

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::Result;
use crate::hcl::Value;
use crate::models::{
    DataSource, FileType, Module, ModuleFile, ModuleRelease, NewModule, NewModuleFile, NewRelease,
    Output, ReleaseEntry, ReleaseWithEntries, Resource, Variable, SUBMODULE_SEPARATOR,
};
use crate::store::{ModuleStore, StoreStats};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, warn};

#[derive(Debug, FromRow)]
struct ModuleRow {
    id: i64,
    name: String,
    full_name: Option<String>,
    description: Option<String>,
    repo_url: Option<String>,
    provider: Option<String>,
    last_updated: String,
    synced_at: String,
    readme: Option<String>,
    has_examples: bool,
    tags_json: String,
}

impl From<ModuleRow> for Module {
    fn from(row: ModuleRow) -> Self {
        Module {
            id: row.id,
            name: row.name,
            full_name: row.full_name,
            description: row.description,
            repo_url: row.repo_url,
            provider: row.provider,
            last_updated: row.last_updated,
            synced_at: row.synced_at,
            readme: row.readme,
            has_examples: row.has_examples,
            tags: serde_json::from_str(&row.tags_json).unwrap_or_default(),
        }
    }
}

#[derive(Debug, FromRow)]
struct FileRow {
    id: i64,
    module_id: i64,
    file_name: String,
    file_path: String,
    file_type: String,
    content: String,
    size_bytes: i64,
}

impl From<FileRow> for ModuleFile {
    fn from(row: FileRow) -> Self {
        ModuleFile {
            id: row.id,
            module_id: row.module_id,
            file_type: row.file_type.parse().unwrap_or(FileType::Other),
            file_name: row.file_name,
            file_path: row.file_path,
            content: row.content,
            size_bytes: row.size_bytes,
        }
    }
}

#[derive(Debug, FromRow)]
struct VariableRow {
    name: String,
    var_type: Option<String>,
    description: Option<String>,
    default_text: Option<String>,
    default_json: Option<String>,
    required: bool,
    sensitive: bool,
    source_file: String,
}

impl From<VariableRow> for Variable {
    fn from(row: VariableRow) -> Self {
        Variable {
            name: row.name,
            var_type: row.var_type,
            description: row.description,
            default_text: row.default_text,
            default_value: row
                .default_json
                .and_then(|j| serde_json::from_str::<Value>(&j).ok()),
            required: row.required,
            sensitive: row.sensitive,
            source_file: row.source_file,
        }
    }
}

#[derive(Debug, FromRow)]
struct OutputRow {
    name: String,
    description: Option<String>,
    sensitive: bool,
    source_file: String,
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    resource_type: String,
    resource_name: String,
    provider: String,
    source_file: String,
}

#[derive(Debug, FromRow)]
struct DataSourceRow {
    data_type: String,
    data_name: String,
    provider: String,
    source_file: String,
}

#[derive(Debug, FromRow)]
struct ReleaseRow {
    id: i64,
    module_id: i64,
    version: String,
    tag: String,
    release_date: Option<String>,
    previous_tag: Option<String>,
    commit_sha: Option<String>,
    previous_commit_sha: Option<String>,
    comparison_url: Option<String>,
}

impl From<ReleaseRow> for ModuleRelease {
    fn from(row: ReleaseRow) -> Self {
        ModuleRelease {
            id: row.id,
            module_id: row.module_id,
            version: row.version,
            tag: row.tag,
            release_date: row.release_date,
            previous_tag: row.previous_tag,
            commit_sha: row.commit_sha,
            previous_commit_sha: row.previous_commit_sha,
            comparison_url: row.comparison_url,
        }
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    section: String,
    entry_key: String,
    title: String,
    order_index: i64,
    identifier: Option<String>,
}

const RELEASE_COLUMNS: &str = "id, module_id, version, tag, release_date, previous_tag, \
     commit_sha, previous_commit_sha, comparison_url";

/// Index database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the index database
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = &config.paths.db_file;

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='modules'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    async fn entries_for(&self, release: ModuleRelease) -> Result<ReleaseWithEntries> {
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT section, entry_key, title, order_index, identifier
             FROM module_release_entries WHERE release_id = ? ORDER BY order_index, id",
        )
        .bind(release.id)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|r| ReleaseEntry {
                section: r.section,
                entry_key: r.entry_key,
                title: r.title,
                order_index: r.order_index,
                identifier: r.identifier,
            })
            .collect();
        Ok(ReleaseWithEntries { release, entries })
    }

    async fn release_where(
        &self,
        clause: &str,
        module_id: i64,
        value: &str,
    ) -> Result<Option<ReleaseWithEntries>> {
        let sql = format!(
            "SELECT {} FROM module_releases WHERE module_id = ? AND {} = ?",
            RELEASE_COLUMNS, clause
        );
        let row = sqlx::query_as::<_, ReleaseRow>(&sql)
            .bind(module_id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.entries_for(row.into()).await?)),
            None => Ok(None),
        }
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&self.pool).await?;
        Ok(n)
    }
}

#[async_trait]
impl ModuleStore for MetaDb {
    // ===== Module Operations =====

    async fn upsert_module(&self, module: &NewModule) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO modules (name, full_name, description, repo_url, last_updated, synced_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                full_name = excluded.full_name,
                description = excluded.description,
                repo_url = excluded.repo_url,
                last_updated = excluded.last_updated,
                synced_at = excluded.synced_at,
                has_examples = 0
            RETURNING id
            "#,
        )
        .bind(&module.name)
        .bind(&module.full_name)
        .bind(&module.description)
        .bind(&module.repo_url)
        .bind(&module.last_updated)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_module(&self, name: &str) -> Result<Option<Module>> {
        let row = sqlx::query_as::<_, ModuleRow>("SELECT * FROM modules WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Module::from))
    }

    async fn get_module_by_id(&self, id: i64) -> Result<Option<Module>> {
        let row = sqlx::query_as::<_, ModuleRow>("SELECT * FROM modules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Module::from))
    }

    async fn list_modules(&self) -> Result<Vec<Module>> {
        let rows = sqlx::query_as::<_, ModuleRow>("SELECT * FROM modules ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Module::from).collect())
    }

    async fn update_module_readme(&self, id: i64, readme: &str) -> Result<()> {
        sqlx::query("UPDATE modules SET readme = ? WHERE id = ?")
            .bind(readme)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_module_has_examples(&self, id: i64, has_examples: bool) -> Result<()> {
        sqlx::query("UPDATE modules SET has_examples = ? WHERE id = ?")
            .bind(has_examples)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_module_provider(&self, id: i64, provider: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE modules SET provider = ? WHERE id = ?")
            .bind(provider)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_module_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        sqlx::query("UPDATE modules SET tags_json = ? WHERE id = ?")
            .bind(serde_json::to_string(tags)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_module_children(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "module_files",
            "module_variables",
            "module_outputs",
            "module_resources",
            "module_data_sources",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE module_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_module(&self, id: i64) -> Result<()> {
        self.clear_module_children(id).await?;

        // Delete release entries first (cascade)
        sqlx::query(
            "DELETE FROM module_release_entries WHERE release_id IN
             (SELECT id FROM module_releases WHERE module_id = ?)",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM module_releases WHERE module_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM modules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_submodules(&self, repo_name: &str) -> Result<u64> {
        let prefix = format!("{}{}", repo_name, SUBMODULE_SEPARATOR);
        let ids: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM modules WHERE substr(name, 1, length(?)) = ?")
                .bind(&prefix)
                .bind(&prefix)
                .fetch_all(&self.pool)
                .await?;

        for (id,) in &ids {
            self.delete_module(*id).await?;
        }
        if !ids.is_empty() {
            debug!(repo = repo_name, count = ids.len(), "Deleted submodules");
        }
        Ok(ids.len() as u64)
    }

    // ===== File and Entity Operations =====

    async fn insert_file(&self, file: &NewModuleFile) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO module_files (module_id, file_name, file_path, file_type, content, size_bytes)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(module_id, file_path) DO UPDATE SET
                file_name = excluded.file_name,
                file_type = excluded.file_type,
                content = excluded.content,
                size_bytes = excluded.size_bytes
            RETURNING id
            "#,
        )
        .bind(file.module_id)
        .bind(&file.file_name)
        .bind(&file.file_path)
        .bind(file.file_type.as_str())
        .bind(&file.content)
        .bind(file.size_bytes)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_files(&self, module_id: i64) -> Result<Vec<ModuleFile>> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM module_files WHERE module_id = ? ORDER BY file_path",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ModuleFile::from).collect())
    }

    async fn get_file(&self, module_id: i64, path: &str) -> Result<Option<ModuleFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM module_files WHERE module_id = ? AND file_path = ?",
        )
        .bind(module_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ModuleFile::from))
    }

    async fn insert_variable(&self, module_id: i64, variable: &Variable) -> Result<()> {
        let default_json = match &variable.default_value {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO module_variables
                (module_id, name, var_type, description, default_text, default_json, required, sensitive, source_file)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(module_id)
        .bind(&variable.name)
        .bind(&variable.var_type)
        .bind(&variable.description)
        .bind(&variable.default_text)
        .bind(default_json)
        .bind(variable.required)
        .bind(variable.sensitive)
        .bind(&variable.source_file)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_output(&self, module_id: i64, output: &Output) -> Result<()> {
        sqlx::query(
            "INSERT INTO module_outputs (module_id, name, description, sensitive, source_file)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(module_id)
        .bind(&output.name)
        .bind(&output.description)
        .bind(output.sensitive)
        .bind(&output.source_file)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_resource(&self, module_id: i64, resource: &Resource) -> Result<()> {
        sqlx::query(
            "INSERT INTO module_resources (module_id, resource_type, resource_name, provider, source_file)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(module_id)
        .bind(&resource.resource_type)
        .bind(&resource.resource_name)
        .bind(&resource.provider)
        .bind(&resource.source_file)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_data_source(&self, module_id: i64, data_source: &DataSource) -> Result<()> {
        sqlx::query(
            "INSERT INTO module_data_sources (module_id, data_type, data_name, provider, source_file)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(module_id)
        .bind(&data_source.data_type)
        .bind(&data_source.data_name)
        .bind(&data_source.provider)
        .bind(&data_source.source_file)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_variables(&self, module_id: i64) -> Result<Vec<Variable>> {
        let rows = sqlx::query_as::<_, VariableRow>(
            "SELECT name, var_type, description, default_text, default_json, required, sensitive, source_file
             FROM module_variables WHERE module_id = ? ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Variable::from).collect())
    }

    async fn list_outputs(&self, module_id: i64) -> Result<Vec<Output>> {
        let rows = sqlx::query_as::<_, OutputRow>(
            "SELECT name, description, sensitive, source_file
             FROM module_outputs WHERE module_id = ? ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Output {
                name: r.name,
                description: r.description,
                sensitive: r.sensitive,
                source_file: r.source_file,
            })
            .collect())
    }

    async fn list_resources(&self, module_id: i64) -> Result<Vec<Resource>> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            "SELECT resource_type, resource_name, provider, source_file
             FROM module_resources WHERE module_id = ? ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Resource {
                resource_type: r.resource_type,
                resource_name: r.resource_name,
                provider: r.provider,
                source_file: r.source_file,
            })
            .collect())
    }

    async fn list_data_sources(&self, module_id: i64) -> Result<Vec<DataSource>> {
        let rows = sqlx::query_as::<_, DataSourceRow>(
            "SELECT data_type, data_name, provider, source_file
             FROM module_data_sources WHERE module_id = ? ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| DataSource {
                data_type: r.data_type,
                data_name: r.data_name,
                provider: r.provider,
                source_file: r.source_file,
            })
            .collect())
    }

    // ===== Release Operations =====

    async fn upsert_release(&self, release: &NewRelease) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO module_releases
                (module_id, version, tag, release_date, previous_tag, commit_sha, previous_commit_sha, comparison_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(module_id, version) DO UPDATE SET
                tag = excluded.tag,
                release_date = excluded.release_date,
                previous_tag = excluded.previous_tag,
                commit_sha = excluded.commit_sha,
                previous_commit_sha = excluded.previous_commit_sha,
                comparison_url = excluded.comparison_url
            RETURNING id
            "#,
        )
        .bind(release.module_id)
        .bind(&release.version)
        .bind(&release.tag)
        .bind(&release.release_date)
        .bind(&release.previous_tag)
        .bind(&release.commit_sha)
        .bind(&release.previous_commit_sha)
        .bind(&release.comparison_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn replace_release_entries(&self, release_id: i64, entries: &[ReleaseEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM module_release_entries WHERE release_id = ?")
            .bind(release_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO module_release_entries
                    (release_id, section, entry_key, title, order_index, identifier)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(release_id)
            .bind(&entry.section)
            .bind(&entry.entry_key)
            .bind(&entry.title)
            .bind(entry.order_index)
            .bind(&entry.identifier)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_release_by_version(
        &self,
        module_id: i64,
        version: &str,
    ) -> Result<Option<ReleaseWithEntries>> {
        self.release_where("version", module_id, version).await
    }

    async fn get_release_by_tag(
        &self,
        module_id: i64,
        tag: &str,
    ) -> Result<Option<ReleaseWithEntries>> {
        self.release_where("tag", module_id, tag).await
    }

    async fn get_latest_release(&self, module_id: i64) -> Result<Option<ReleaseWithEntries>> {
        let sql = format!(
            "SELECT {} FROM module_releases WHERE module_id = ?
             ORDER BY COALESCE(release_date, '') DESC, id DESC LIMIT 1",
            RELEASE_COLUMNS
        );
        let row = sqlx::query_as::<_, ReleaseRow>(&sql)
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.entries_for(row.into()).await?)),
            None => Ok(None),
        }
    }

    async fn list_releases(&self, module_id: i64) -> Result<Vec<ModuleRelease>> {
        let sql = format!(
            "SELECT {} FROM module_releases WHERE module_id = ?
             ORDER BY COALESCE(release_date, '') DESC, id DESC",
            RELEASE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReleaseRow>(&sql)
            .bind(module_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ModuleRelease::from).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let submodule_filter = format!("instr(name, '{}') > 0", SUBMODULE_SEPARATOR);
        let stats = StoreStats {
            modules: self
                .count(&format!(
                    "SELECT COUNT(*) FROM modules WHERE NOT {}",
                    submodule_filter
                ))
                .await?,
            submodules: self
                .count(&format!(
                    "SELECT COUNT(*) FROM modules WHERE {}",
                    submodule_filter
                ))
                .await?,
            files: self.count("SELECT COUNT(*) FROM module_files").await?,
            variables: self.count("SELECT COUNT(*) FROM module_variables").await?,
            outputs: self.count("SELECT COUNT(*) FROM module_outputs").await?,
            resources: self.count("SELECT COUNT(*) FROM module_resources").await?,
            data_sources: self.count("SELECT COUNT(*) FROM module_data_sources").await?,
            releases: self.count("SELECT COUNT(*) FROM module_releases").await?,
            release_entries: self
                .count("SELECT COUNT(*) FROM module_release_entries")
                .await?,
        };
        if stats.modules == 0 {
            warn!("Index is empty; run 'modindex sync'");
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let db = MetaDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();
        (db, tmp)
    }

    fn new_module(name: &str) -> NewModule {
        NewModule {
            name: name.to_string(),
            full_name: Some(format!("cloudnationhq/{}", name)),
            description: Some("Key vault".to_string()),
            repo_url: Some(format!("https://github.com/cloudnationhq/{}", name)),
            last_updated: "2024-05-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_module_upsert_and_lookup() {
        let (db, _tmp) = setup_test_db().await;
        assert!(db.is_initialized().await.unwrap());

        let id = db.upsert_module(&new_module("terraform-azure-kv")).await.unwrap();
        db.set_module_has_examples(id, true).await.unwrap();
        db.set_module_tags(id, &["vault".to_string(), "azurerm".to_string()])
            .await
            .unwrap();
        db.set_module_provider(id, Some("azurerm")).await.unwrap();

        let module = db.get_module("terraform-azure-kv").await.unwrap().unwrap();
        assert_eq!(module.id, id);
        assert!(module.has_examples);
        assert_eq!(module.tags, vec!["vault", "azurerm"]);
        assert_eq!(module.provider.as_deref(), Some("azurerm"));

        let mut changed = new_module("terraform-azure-kv");
        changed.last_updated = "2024-06-01T10:00:00Z".to_string();
        let again = db.upsert_module(&changed).await.unwrap();
        assert_eq!(again, id);

        let module = db.get_module_by_id(id).await.unwrap().unwrap();
        assert_eq!(module.last_updated, "2024-06-01T10:00:00Z");
        assert!(!module.has_examples);
        assert_eq!(module.tags.len(), 2);
        assert!(db.get_module("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_children_clear_and_delete() {
        let (db, _tmp) = setup_test_db().await;
        let root = db.upsert_module(&new_module("terraform-azure-kv")).await.unwrap();
        let child = db
            .upsert_module(&new_module("terraform-azure-kv//modules/secrets"))
            .await
            .unwrap();

        db.insert_file(&NewModuleFile::new(root, "main.tf", "x".into(), 1))
            .await
            .unwrap();
        db.insert_file(&NewModuleFile::new(root, "main.tf", "xy".into(), 2))
            .await
            .unwrap();
        db.insert_resource(
            root,
            &Resource {
                resource_type: "azurerm_key_vault".into(),
                resource_name: "this".into(),
                provider: "azurerm".into(),
                source_file: "main.tf".into(),
            },
        )
        .await
        .unwrap();
        db.insert_variable(
            root,
            &Variable {
                name: "tags".into(),
                var_type: Some("map(string)".into()),
                description: None,
                default_text: Some("{ env = \"dev\" }".into()),
                default_value: Some(Value::Map(vec![("env".into(), Value::String("dev".into()))])),
                required: false,
                sensitive: false,
                source_file: "variables.tf".into(),
            },
        )
        .await
        .unwrap();

        let files = db.list_files(root).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "xy");
        assert_eq!(files[0].file_type, FileType::Terraform);

        let vars = db.list_variables(root).await.unwrap();
        assert_eq!(
            vars[0].default_value,
            Some(Value::Map(vec![("env".into(), Value::String("dev".into()))]))
        );

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.modules, 1);
        assert_eq!(stats.submodules, 1);
        assert_eq!(stats.resources, 1);

        db.clear_module_children(root).await.unwrap();
        assert!(db.list_files(root).await.unwrap().is_empty());
        assert!(db.list_resources(root).await.unwrap().is_empty());
        assert!(db.list_variables(root).await.unwrap().is_empty());

        assert_eq!(db.delete_submodules("terraform-azure-kv").await.unwrap(), 1);
        assert!(db.get_module_by_id(child).await.unwrap().is_none());
        assert!(db.get_module_by_id(root).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_entries_replaced() {
        let (db, _tmp) = setup_test_db().await;
        let id = db.upsert_module(&new_module("terraform-azure-kv")).await.unwrap();

        let release = NewRelease {
            module_id: id,
            version: "1.2.0".into(),
            tag: "v1.2.0".into(),
            release_date: Some("2024-05-01".into()),
            previous_tag: Some("v1.1.0".into()),
            ..Default::default()
        };
        let release_id = db.upsert_release(&release).await.unwrap();
        assert_eq!(db.upsert_release(&release).await.unwrap(), release_id);

        let entry = |key: &str, order: i64| ReleaseEntry {
            section: "Features".into(),
            entry_key: key.into(),
            title: format!("title {}", key),
            order_index: order,
            identifier: None,
        };
        db.replace_release_entries(release_id, &[entry("features-0000", 0), entry("features-0001", 1)])
            .await
            .unwrap();
        db.replace_release_entries(release_id, &[entry("features-0000", 0)])
            .await
            .unwrap();

        let found = db.get_release_by_tag(id, "v1.2.0").await.unwrap().unwrap();
        assert_eq!(found.entries.len(), 1);
        assert_eq!(found.release.previous_tag.as_deref(), Some("v1.1.0"));

        db.upsert_release(&NewRelease {
            module_id: id,
            version: "1.3.0".into(),
            tag: "v1.3.0".into(),
            release_date: Some("2024-06-01".into()),
            ..Default::default()
        })
        .await
        .unwrap();
        let latest = db.get_latest_release(id).await.unwrap().unwrap();
        assert_eq!(latest.release.version, "1.3.0");
        assert_eq!(db.list_releases(id).await.unwrap().len(), 2);

        db.delete_module(id).await.unwrap();
        assert!(db.get_release_by_version(id, "1.2.0").await.unwrap().is_none());
    }
}
