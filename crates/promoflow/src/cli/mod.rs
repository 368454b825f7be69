//! CLI for Promoflow
//!
//! Operator-facing commands over the catalog and task store. The REST
//! facade used by the dashboard lives elsewhere; this binary covers the
//! same core operations for scripting and recovery work.

use crate::campaign;
use crate::catalog::{self, PathResolver, Scanner};
use crate::config::StorageConfig;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use promoflow_db::{AssetType, ImageFilter, PromoDb, SourceKind, TaskFilter, TaskStatus};
use std::path::PathBuf;

fn parse_asset_type(s: &str) -> Result<AssetType, String> {
    AssetType::parse(s).ok_or_else(|| {
        format!("unknown asset type '{s}' (general, advertising_campaign, advertising_rule, rule_card_screenshot)")
    })
}

fn parse_source_kind(s: &str) -> Result<SourceKind, String> {
    SourceKind::parse(s).ok_or_else(|| format!("unknown source kind '{s}' (upload, local_dir, generated)"))
}

fn parse_task_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s)
        .ok_or_else(|| format!("unknown status '{s}' (active, completed, expired, draft)"))
}

#[derive(Parser)]
#[command(name = "promoflow", about = "Asset catalog & campaign task tracker", version)]
pub struct Cli {
    /// Database path (defaults to ~/.promoflow/promoflow.sqlite3)
    #[arg(long, env = "PROMOFLOW_DB", global = true)]
    db: Option<PathBuf>,

    /// Storage config TOML (defaults to environment/built-ins)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory of image files into the catalog
    Scan {
        directory: PathBuf,
        /// Asset type to assign (and to correct same-named uploads to)
        #[arg(long, value_parser = parse_asset_type)]
        asset_type: Option<AssetType>,
    },
    /// Retype everything under a directory and collapse upload duplicates
    Reclassify {
        directory: PathBuf,
        #[arg(value_parser = parse_asset_type)]
        asset_type: AssetType,
    },
    /// Classify a task title (no database access)
    Classify { title: String },
    /// Sync a scraped feed batch (JSON array file)
    Sync { feed: PathBuf },
    /// Manage per-asset-type default locations
    Locations {
        #[command(subcommand)]
        command: LocationsCommand,
    },
    /// Inspect and maintain catalogued images
    Images {
        #[command(subcommand)]
        command: ImagesCommand,
    },
    /// Inspect campaign tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
}

#[derive(Subcommand)]
enum LocationsCommand {
    List,
    Get {
        #[arg(value_parser = parse_asset_type)]
        asset_type: AssetType,
    },
    Set {
        #[arg(value_parser = parse_asset_type)]
        asset_type: AssetType,
        directory: String,
    },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ImagesCommand {
    List {
        #[arg(long, value_parser = parse_source_kind)]
        source: Option<SourceKind>,
        #[arg(long, value_parser = parse_asset_type)]
        asset_type: Option<AssetType>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Delete a record (and, for uploads, the backing file)
    Delete { id: i64 },
    /// Print the absolute path and MIME type an image resolves to
    Resolve { id: i64 },
    /// Drop every local_dir record without touching the filesystem
    ClearLocal,
}

#[derive(Subcommand)]
enum TasksCommand {
    List {
        #[arg(long, value_parser = parse_task_status)]
        status: Option<TaskStatus>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Stats,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => StorageConfig::load(path)?,
            None => StorageConfig::from_env(),
        };

        // classify needs no database
        if let Command::Classify { title } = &self.command {
            println!("{}", campaign::classify(title));
            return Ok(());
        }

        let db_path = self
            .db
            .clone()
            .unwrap_or_else(StorageConfig::default_db_path);
        let db = PromoDb::open(&db_path).await?;

        match self.command {
            Command::Classify { .. } => unreachable!(),
            Command::Scan {
                directory,
                asset_type,
            } => {
                let report = Scanner::new(db, config).scan(&directory, asset_type).await?;
                println!(
                    "added {} / updated {} / skipped {} (of {} files)",
                    report.added, report.updated, report.skipped, report.total_files
                );
            }
            Command::Reclassify {
                directory,
                asset_type,
            } => {
                let report = Scanner::new(db, config)
                    .reclassify(&directory, asset_type)
                    .await?;
                println!(
                    "updated {} local records, {} upload records",
                    report.updated_local, report.updated_upload
                );
            }
            Command::Sync { feed } => {
                let text = std::fs::read_to_string(&feed)
                    .with_context(|| format!("reading {}", feed.display()))?;
                let records: Vec<serde_json::Value> =
                    serde_json::from_str(&text).context("feed must be a JSON array")?;
                let report = campaign::sync_feed(&db, &records).await?;
                println!(
                    "created {} / updated {} / skipped {} (of {})",
                    report.created, report.updated, report.skipped, report.total
                );
            }
            Command::Locations { command } => match command {
                LocationsCommand::List => {
                    let mut table = new_table(vec!["ID", "ASSET TYPE", "DIRECTORY"]);
                    for loc in db.location_list().await? {
                        table.add_row(vec![
                            loc.id.to_string(),
                            loc.asset_type.to_string(),
                            loc.directory,
                        ]);
                    }
                    println!("{table}");
                }
                LocationsCommand::Get { asset_type } => match db.location_get(asset_type).await? {
                    Some(loc) => println!("{}", loc.directory),
                    None => bail!("no default location configured for {asset_type}"),
                },
                LocationsCommand::Set {
                    asset_type,
                    directory,
                } => {
                    let loc = db.location_set(asset_type, &directory).await?;
                    println!("{} -> {}", loc.asset_type, loc.directory);
                }
                LocationsCommand::Delete { id } => {
                    db.location_delete(id).await?;
                    println!("deleted location {id}");
                }
            },
            Command::Images { command } => match command {
                ImagesCommand::List {
                    source,
                    asset_type,
                    limit,
                } => {
                    let images = db
                        .image_list(ImageFilter {
                            source_kind: source,
                            asset_type,
                            limit: Some(limit),
                            offset: None,
                        })
                        .await?;
                    let mut table =
                        new_table(vec!["ID", "FILENAME", "SOURCE", "TYPE", "STORAGE PATH"]);
                    for image in images {
                        table.add_row(vec![
                            image.id.to_string(),
                            image.filename,
                            image.source_kind.to_string(),
                            image.asset_type.to_string(),
                            image.storage_path,
                        ]);
                    }
                    println!("{table}");
                }
                ImagesCommand::Delete { id } => {
                    let outcome = catalog::delete_image(&db, &config, id).await?;
                    match (outcome.file_removed, outcome.file_error) {
                        (true, _) => println!("deleted image {id} and its file"),
                        (false, Some(err)) => {
                            println!("deleted image {id}; file removal failed: {err}")
                        }
                        (false, None) => println!("deleted image {id}"),
                    }
                }
                ImagesCommand::Resolve { id } => {
                    let image = db
                        .image_get(id)
                        .await?
                        .with_context(|| format!("image {id} not found"))?;
                    let locations = db.location_map().await?;
                    let path = PathResolver::new(&config).resolve(&image, &locations)?;
                    println!("{} ({})", path.display(), catalog::mime_for_path(&path));
                }
                ImagesCommand::ClearLocal => {
                    let count = db.image_clear_local().await?;
                    println!("cleared {count} local_dir records");
                }
            },
            Command::Tasks { command } => match command {
                TasksCommand::List { status, limit } => {
                    let tasks = db
                        .task_list(TaskFilter {
                            status,
                            task_type: None,
                            limit: Some(limit),
                            offset: None,
                        })
                        .await?;
                    let mut table = new_table(vec![
                        "ID", "EXTERNAL", "TITLE", "TYPE", "STATUS", "AMOUNT", "PARTICIPATED",
                    ]);
                    for task in tasks {
                        table.add_row(vec![
                            task.id.to_string(),
                            task.external_task_id,
                            task.task_title,
                            task.task_type.to_string(),
                            task.status.to_string(),
                            format!("{:.2}", task.amount),
                            task.participated.to_string(),
                        ]);
                    }
                    println!("{table}");
                }
                TasksCommand::Stats => {
                    let stats = db.task_stats().await?;
                    let participation = db.participation_status().await?;
                    println!(
                        "total {} / active {} / completed {} / expired {}",
                        stats.total, stats.active, stats.completed, stats.expired
                    );
                    println!(
                        "participated {} of {}",
                        participation.participated, participation.total
                    );
                }
            },
        }

        Ok(())
    }
}

fn new_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers);
    table
}
