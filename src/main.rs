#![allow(unknown_lints, renamed_and_removed_lints)]
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing
    )
)]

use binders_repository::config::{load_config_from, load_repository_config, RepositoryConfig};
use binders_repository::item::lifecycle::purge_expired;
use binders_repository::item::repositories::Repositories;
use binders_repository::logging::{init_logging, parse_rotation, LogConfig, LOG_FILENAME};
use binders_repository::migration::{MigrationRunner, Migrator, ReindexPlan, RewriteImageUrls};
use binders_repository::oplog::{JsonlOperationLog, OperationLogger};
use binders_repository::publication_flags::HasPublicationsResolver;
use binders_repository::store::{DocumentStore, IndexDefinition, MemoryStore};
use binders_repository::tree::TreeOperations;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Maintenance tool for the binder repository store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Repository config file (default: ~/.binders/repository.toml)
    #[arg(short, long, env = "BINDERS_REPOSITORY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable JSON log format (for production/log aggregation)
    #[arg(long, env = "BINDERS_LOG_JSON", default_value = "false")]
    log_json: bool,

    /// Custom log directory (default: ~/.binders/logs)
    #[arg(long, env = "BINDERS_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log rotation period: daily, hourly, or never
    #[arg(long, env = "BINDERS_LOG_ROTATION")]
    log_rotation: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy an index into a new one and move its alias after verification
    Reindex {
        /// Alias to cut over
        #[arg(long)]
        alias: String,
        /// Source index (default: the index the alias points to)
        #[arg(long)]
        from: Option<String>,
        /// Destination index
        #[arg(long)]
        to: String,
        /// JSON file with `mappings` and `settings` for the new index
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Permanently delete items soft-deleted longer than the retention period
    Purge,
    /// Recompute publication flags
    ResolveFlags {
        /// Only resolve this collection and propagate from it
        #[arg(long)]
        collection: Option<String>,
    },
    /// Recompute stored ancestor ids of every item
    PopulateAncestors,
    /// Rewrite image URLs matching a pattern in binders, collections and publications
    RewriteUrls {
        #[arg(long)]
        pattern: String,
        #[arg(long)]
        replacement: String,
    },
}

fn log_config(args: &Args, config: &RepositoryConfig) -> LogConfig {
    let mut log = LogConfig::from(&config.logging);
    if let Some(dir) = &args.log_dir {
        log.log_dir.clone_from(dir);
    }
    if let Some(rotation) = args.log_rotation.as_deref() {
        log.rotation = parse_rotation(rotation);
    }
    log.json_format |= args.log_json;
    log
}

async fn read_definition(path: Option<&Path>) -> Result<IndexDefinition> {
    let Some(path) = path else {
        return Ok(IndexDefinition::default());
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

#[allow(clippy::too_many_lines)]
async fn run(command: Command, config: &RepositoryConfig, store: Arc<MemoryStore>) -> Result<()> {
    let (oplog, oplog_task) = if config.operation_log.enabled {
        let (logger, task) =
            OperationLogger::spawn(Arc::new(JsonlOperationLog::new(config.operation_log_path())));
        (logger, Some(task))
    } else {
        (OperationLogger::disabled(), None)
    };
    let dyn_store: Arc<dyn DocumentStore> = store;
    Repositories::bootstrap(dyn_store.as_ref(), &config.indices).await?;
    let repos = Repositories::from_config(Arc::clone(&dyn_store), config, &oplog)?;
    let max_depth = config.resolver.max_depth;
    let migrator = Migrator::new(
        Arc::clone(&dyn_store),
        config.scroll.settings()?,
        config.retry.policy()?,
    );

    match command {
        Command::Reindex {
            alias,
            from,
            to,
            mapping,
        } => {
            let definition = read_definition(mapping.as_deref()).await?;
            let plan = match from {
                Some(from) => ReindexPlan::new(&alias, from, &to)
                    .with_definition(definition),
                None => migrator.plan_reindex(&alias, &to, definition).await?,
            };
            let outcome = migrator
                .reindex_with_cutover(&plan, &config.reindex.verification()?)
                .await?;
            info!(alias = %outcome.alias, index = %outcome.new_index, documents = outcome.documents, "Reindex done");
        }
        Command::Purge => {
            let report = purge_expired(&repos, config.purge.retention()?).await?;
            info!(
                binders = report.binders,
                collections = report.collections,
                publications = report.publications,
                "Purge done"
            );
        }
        Command::ResolveFlags { collection } => {
            let resolver = HasPublicationsResolver::new(&repos, max_depth);
            if let Some(id) = collection {
                let flag = resolver.resolve_collection_by_id(&id).await?;
                info!(collection_id = %id, has_publications = flag, "Collection resolved");
            } else {
                let report = resolver.resolve_all().await?;
                info!(passes = report.passes, changed = report.changed, "Flags converged");
            }
        }
        Command::PopulateAncestors => {
            let refreshed = TreeOperations::new(&repos, max_depth)
                .populate_ancestor_ids()
                .await?;
            info!(items = refreshed, "Ancestor ids refreshed");
        }
        Command::RewriteUrls {
            pattern,
            replacement,
        } => {
            let indices = vec![
                config.indices.binders.alias.clone(),
                config.indices.collections.alias.clone(),
                config.indices.publications.alias.clone(),
            ];
            let summary = MigrationRunner::new(migrator)
                .register(Arc::new(RewriteImageUrls::new(indices, &pattern, replacement)?))
                .run_pending()
                .await?;
            info!(applied = summary.applied.len(), skipped = summary.skipped.len(), "Data migrations done");
        }
    }

    drop(repos);
    drop(oplog);
    if let Some(task) = oplog_task {
        task.await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_repository_config()?,
    };

    let log_config = log_config(&args, &config);
    let log_file = log_config.log_dir.join(LOG_FILENAME);
    if let Err(e) = init_logging(log_config) {
        eprintln!("Error: Failed to initialize logging: {e}");
        eprintln!("Logs: {}", log_file.display());
        return Err(e);
    }

    let snapshot = config.store.snapshot_path.clone();
    let store = Arc::new(MemoryStore::load(&snapshot).await?);
    info!(snapshot = %snapshot.display(), command = ?args.command, "Starting");

    run(args.command, &config, Arc::clone(&store)).await?;

    store
        .save(&snapshot)
        .await
        .map_err(|e| eyre!("saving {}: {e}", snapshot.display()))?;
    info!(snapshot = %snapshot.display(), "Store saved");
    Ok(())
}
