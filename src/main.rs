//! modindex CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use modindex::{
    cancel::CancellationToken,
    commands::{
        cmd_compare, cmd_init, cmd_list_modules, cmd_release_backfill, cmd_release_show,
        cmd_release_snippet, cmd_status, cmd_sync, cmd_update, print_changed_files,
        print_init_report, print_modules, print_status, print_sync_report,
    },
    config::Config,
    error::{Error, Result},
    github::GitHubClient,
    meta::MetaDb,
    progress::LogWriterFactory,
    release::SnippetRequest,
    store::ModuleStore,
    sync::Syncer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "modindex")]
#[command(version, about = "Sync and structurally index Terraform module repositories", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// GitHub token (overrides the configured token environment variable)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize modindex configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Re-sync every eligible repository, then rebuild categories
    Sync,

    /// Re-sync repositories changed since the last sync
    Update,

    /// List files changed between two refs of a repository
    Compare {
        /// Repository as owner/name
        repo: String,
        /// Base ref
        from: String,
        /// Head ref
        to: String,
    },

    /// Inspect releases parsed from module changelogs
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// List indexed modules with their tags
    Modules,

    /// Show index statistics
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Summarize a release (latest when no version is given)
    Show {
        module: String,
        version: Option<String>,
    },

    /// Re-ingest one release from the stored changelog
    Backfill { module: String, version: String },

    /// Show the diff behind a changelog entry
    Snippet {
        module: String,
        version: String,
        /// Entry identifier or title text
        query: String,

        /// Maximum diff lines to show
        #[arg(long)]
        max_lines: Option<usize>,

        /// Title text to prefer when the query matches no identifier
        #[arg(long)]
        fallback: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config.as_deref(), force, cli.json).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "modindex", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    config.github.token_override = cli.token.clone();
    if cli.json {
        config.sync.show_progress = false;
    }

    let db = MetaDb::connect(&config).await?;
    if !db.is_initialized().await? {
        return Err(Error::NotInitialized);
    }
    let store: Arc<dyn ModuleStore> = Arc::new(db);

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Sync => handle_sync(&config, store, false, cli.json).await?,

        Commands::Update => handle_sync(&config, store, true, cli.json).await?,

        Commands::Compare { repo, from, to } => {
            let syncer = build_syncer(&config, store)?;
            let files = cmd_compare(&syncer, &repo, &from, &to).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                print_changed_files(&files);
            }
        }

        Commands::Release { action } => {
            handle_release(&config, store.as_ref(), action, cli.json).await?;
        }

        Commands::Modules => {
            let modules = cmd_list_modules(store.as_ref()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&modules)?);
            } else {
                print_modules(&modules);
            }
        }

        Commands::Status => {
            let client = GitHubClient::new(&config.github)?;
            let status = cmd_status(&config, store.as_ref(), &client).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn build_syncer(config: &Config, store: Arc<dyn ModuleStore>) -> Result<Syncer> {
    let client = GitHubClient::new(&config.github)?;
    Ok(Syncer::new(store, client, config.clone()))
}

async fn handle_sync(
    config: &Config,
    store: Arc<dyn ModuleStore>,
    incremental: bool,
    json: bool,
) -> Result<()> {
    let syncer = build_syncer(config, store)?;
    watch_ctrl_c(syncer.cancellation_token());

    let report = if incremental {
        cmd_update(&syncer).await?
    } else {
        cmd_sync(&syncer).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_sync_report(&report, incremental);
    }
    Ok(())
}

/// Request cancellation on Ctrl-C; the pass stops before the next repository
fn watch_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current repository");
            token.cancel();
        }
    });
}

async fn handle_release(
    config: &Config,
    store: &dyn ModuleStore,
    action: ReleaseAction,
    json: bool,
) -> Result<()> {
    match action {
        ReleaseAction::Show { module, version } => {
            let view = cmd_release_show(store, &module, version.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", view.summary());
            }
        }

        ReleaseAction::Backfill { module, version } => {
            let view = cmd_release_backfill(config, store, &module, &version).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!(
                    "✓ Backfilled {} {} ({} entries)\n",
                    view.module,
                    view.release.release.version,
                    view.release.entries.len()
                );
                print!("{}", view.summary());
            }
        }

        ReleaseAction::Snippet {
            module,
            version,
            query,
            max_lines,
            fallback,
        } => {
            let client = GitHubClient::new(&config.github)?;
            let request = SnippetRequest {
                module: &module,
                version: &version,
                query: &query,
                max_lines: max_lines.unwrap_or(0),
                fallback: fallback.as_deref(),
            };
            let snippet = cmd_release_snippet(config, store, &client, request).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "module": snippet.module,
                        "version": snippet.version,
                        "title": snippet.title,
                        "file": snippet.filename,
                        "patch": snippet.patch,
                        "truncated": snippet.truncated,
                        "compare_url": snippet.comparison_url,
                    })
                );
            } else {
                println!("{}", snippet);
            }
        }
    }

    Ok(())
}

async fn handle_init(config: Option<&Path>, force: bool, json: bool) -> Result<()> {
    // A .toml path names the config file; anything else is the base directory
    let base_dir = config.map(|path| {
        if path.extension().is_some_and(|e| e == "toml") {
            path.parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir)
        } else {
            path.to_path_buf()
        }
    });

    let report = cmd_init(base_dir, force).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_init_report(&report);
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p.to_path_buf(),
        Some(p) => p.join("config.toml"),
        None => Config::default_config_path(),
    };

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}
