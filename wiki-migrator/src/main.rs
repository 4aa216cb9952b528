//! Command line front end for wiki space migrations
//!
//! # Usage
//!
//! ```bash
//! # Create the audit document a migration will be recorded in
//! wiki-migrator init-audit Admin.MigrationAudit
//!
//! # Migrate two spaces from a JSON export
//! wiki-migrator run --export export.json --audit-doc Admin.MigrationAudit --space ENG --space OPS
//!
//! # Show what was recorded
//! wiki-migrator show-audit Admin.MigrationAudit
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wiki_migrator::audit::{AuditStore, JobCompletionHandler};
use wiki_migrator::job::{EntityReference, JsonExportSource, MigrationRequest, SpaceSelection};
use wiki_migrator::store::SqliteStore;
use wiki_migrator::{Config, EventBus, MacroConverterRegistry, MigrationConfiguration, MigrationJob};

#[derive(Parser)]
#[command(name = "wiki-migrator")]
#[command(about = "Migrate wiki spaces and convert their macros", long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Database URL, overrides storage.database_url
    #[arg(long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an audit document
    InitAudit {
        /// Audit document reference
        document: String,
    },
    /// Run a migration job
    Run {
        /// JSON export of the source wiki
        #[arg(long)]
        export: PathBuf,
        /// Audit document the run is recorded in
        #[arg(long)]
        audit_doc: String,
        /// Space to migrate, as KEY or KEY:Name (repeatable; all spaces when omitted)
        #[arg(long = "space")]
        spaces: Vec<String>,
        /// Target root, overrides migration.target_root
        #[arg(long)]
        target_root: Option<String>,
    },
    /// Print an audit record
    ShowAudit {
        /// Audit document reference
        document: String,
    },
}

fn init_logging(config: &Config) {
    let json = config.logging.format == "json";
    let default_filter = format!("wiki_migrator={}", config.logging.level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        Config::from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

/// Parse `KEY` or `KEY:Name`, falling back to the export's space name
fn parse_space(raw: &str, export: &JsonExportSource) -> anyhow::Result<SpaceSelection> {
    let (key, name) = match raw.split_once(':') {
        Some((key, name)) => (key.trim(), Some(name.trim())),
        None => (raw.trim(), None),
    };
    if key.is_empty() {
        bail!("empty space key in '{}'", raw);
    }

    let name = name
        .filter(|name| !name.is_empty())
        .or_else(|| export.space_name(key))
        .unwrap_or(key);
    Ok(SpaceSelection::new(key, name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(db) = cli.db {
        config.storage.database_url = db;
    }
    init_logging(&config);

    info!("Starting wiki-migrator v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(SqliteStore::connect(&config.storage.database_url).await?);

    match cli.command {
        Commands::InitAudit { document } => {
            let record = store.create_record(&EntityReference::new(document)).await?;
            if record.executed {
                println!("Audit document {} was already executed", record.document);
            } else {
                println!("✓ Audit document {} ready", record.document);
            }
        }
        Commands::Run {
            export,
            audit_doc,
            spaces,
            target_root,
        } => {
            let extension_ids = config.extension_ids()?;
            let registry = MacroConverterRegistry::with_builtins(
                &extension_ids,
                &config.migration.tasklist_marker,
            );

            let source = JsonExportSource::from_file(&export).await?;
            let spaces: Vec<SpaceSelection> = if spaces.is_empty() {
                source
                    .space_keys()
                    .into_iter()
                    .map(|key| SpaceSelection::new(key, source.space_name(key).unwrap_or(key)))
                    .collect()
            } else {
                spaces
                    .iter()
                    .map(|raw| parse_space(raw, &source))
                    .collect::<anyhow::Result<Vec<_>>>()?
            };
            if spaces.is_empty() {
                bail!("export {} contains no spaces", export.display());
            }

            let audit_document = EntityReference::new(audit_doc);
            match store.load_record(&audit_document).await? {
                None => bail!(
                    "audit document {} does not exist, create it with init-audit",
                    audit_document
                ),
                Some(record) if record.executed => {
                    bail!("audit document {} was already executed", audit_document)
                }
                Some(_) => {}
            }

            let request = MigrationRequest {
                audit_document,
                target_root: EntityReference::new(
                    target_root.unwrap_or_else(|| config.migration.target_root.clone()),
                ),
                spaces,
            };

            let bus = EventBus::new();
            let handler = JobCompletionHandler::new(store.clone()).spawn(&bus);

            let job = MigrationJob::new(request, Arc::new(registry), Arc::new(source), store.clone())
                .with_parallelism(config.migration.max_parallel_spaces);

            let token = job.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling migration");
                    token.cancel();
                }
            });

            let snapshot = job.run(&bus).await;
            let audit_document = snapshot.request.audit_document.clone();

            // Closing the bus lets the handler drain and stop
            drop(bus);
            let failures = handler.await.context("completion handler panicked")?;

            for result in &snapshot.results {
                println!(
                    "{} -> {}: {} migrated, {} failed",
                    result.space.key, result.target, result.documents_migrated, result.documents_failed
                );
            }
            println!(
                "Job {} {} with {} errors",
                snapshot.id,
                snapshot.state,
                snapshot.error_count()
            );

            if let Some(failure) = failures.into_iter().next() {
                bail!("migration job {} was not recorded: {}", snapshot.id, failure);
            }
            let recorded = store
                .load_record(&audit_document)
                .await?
                .is_some_and(|record| record.executed);
            if !recorded {
                bail!(
                    "audit document {} was not marked executed by job {}",
                    audit_document,
                    snapshot.id
                );
            }

            if !snapshot.succeeded() {
                std::process::exit(1);
            }
        }
        Commands::ShowAudit { document } => {
            let document = EntityReference::new(document);
            let Some(record) = store.load_record(&document).await? else {
                bail!("audit document {} does not exist", document);
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
