//! pageweave CLI tool
//!
//! Command-line interface over the page derivation engine and its SQLite store.
//!
//! ## Commands
//!
//! - `refs <file>` / `media <file>`: scan a content file without touching the store
//! - `create`, `update`, `move`, `delete`: page mutations, each re-deriving structure, links and
//!   media inside one transaction
//! - `show`, `backlinks`, `outlinks`, `tree`: read-only queries
//!
//! Store-backed commands print JSON to stdout. Logging goes to stderr and honors `RUST_LOG`.

use clap::{Parser, Subcommand};
use pageweave::{
    config::{Settings, SettingsProvider, TomlSettingsProvider},
    db::SqliteStore,
    media::parse_all,
    properties::{MoveRequest, PageDraft, PageId, PageUpdate},
    references::extract_references,
    service::PageService,
    PageweaveError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pageweave")]
#[command(author, version, about = "Derive page hierarchy, links and media from page content", long_about = None)]
struct Cli {
    /// Settings file (TOML). Missing files fall back to defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the settings file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the page references found in a file, one per line with its byte position
    Refs { file: PathBuf },

    /// Print the media candidates found in a file as JSON
    Media { file: PathBuf },

    /// Create a page
    Create {
        #[arg(long)]
        slug: String,

        #[arg(long)]
        title: String,

        /// File holding the page content
        #[arg(long)]
        content_file: Option<PathBuf>,

        #[arg(long)]
        parent_id: Option<i64>,

        #[arg(long)]
        order: Option<u32>,
    },

    /// Update a page. Without --parent-id the page becomes a root.
    Update {
        slug: String,

        /// Rename the page
        #[arg(long)]
        new_slug: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content_file: Option<PathBuf>,

        #[arg(long)]
        parent_id: Option<i64>,

        #[arg(long)]
        order: Option<u32>,
    },

    /// Move a page under another page, or to the root level without --parent-id
    Move {
        slug: String,

        #[arg(long)]
        parent_id: Option<i64>,

        #[arg(long)]
        order: Option<u32>,
    },

    /// Delete a page with its links and media references
    Delete { slug: String },

    /// Show a page with its media references
    Show { slug: String },

    /// List the pages referencing a page
    Backlinks { slug: String },

    /// List the pages a page references
    Outlinks { slug: String },

    /// Print the navigation tree
    Tree,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with env filter (respects RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Refs { file } => {
            let text = std::fs::read_to_string(&file)?;
            for reference in extract_references(&text) {
                println!("{}\t{}", reference.position, reference.identifier);
            }
            Ok(())
        }
        Commands::Media { file } => {
            let text = std::fs::read_to_string(&file)?;
            print_json(&parse_all(&text))
        }
        command => {
            let settings = load_settings(cli.config.as_deref(), cli.db)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run(command, settings))
        }
    }
}

fn load_settings(
    config: Option<&Path>,
    db: Option<PathBuf>,
) -> Result<Settings, PageweaveError> {
    let mut settings = match config {
        Some(path) => TomlSettingsProvider::new(path.to_path_buf()).get_settings()?,
        None => Settings::default(),
    };
    if let Some(db) = db {
        settings.database = db;
    }
    Ok(settings)
}

fn read_content(file: Option<PathBuf>) -> Result<Option<String>, PageweaveError> {
    Ok(match file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&settings.database).await?;
    let service = PageService::new(store, settings);

    match command {
        Commands::Create {
            slug,
            title,
            content_file,
            parent_id,
            order,
        } => {
            let view = service
                .create_page(PageDraft {
                    slug,
                    title,
                    content: read_content(content_file)?.unwrap_or_default(),
                    parent_id: parent_id.map(PageId),
                    order_index: order,
                })
                .await?;
            print_json(&view)
        }
        Commands::Update {
            slug,
            new_slug,
            title,
            content_file,
            parent_id,
            order,
        } => {
            let view = service
                .update_page(
                    &slug,
                    PageUpdate {
                        slug: new_slug,
                        title,
                        content: read_content(content_file)?,
                        parent_id: parent_id.map(PageId),
                        order_index: order,
                    },
                )
                .await?;
            print_json(&view)
        }
        Commands::Move {
            slug,
            parent_id,
            order,
        } => {
            let view = service
                .move_page(
                    &slug,
                    MoveRequest {
                        parent_id: parent_id.map(PageId),
                        order_index: order,
                    },
                )
                .await?;
            print_json(&view)
        }
        Commands::Delete { slug } => {
            service.delete_page(&slug).await?;
            println!("Deleted {slug}");
            Ok(())
        }
        Commands::Show { slug } => print_json(&service.get_page(&slug).await?),
        Commands::Backlinks { slug } => print_json(&service.list_backlinks(&slug).await?),
        Commands::Outlinks { slug } => print_json(&service.list_outlinks(&slug).await?),
        Commands::Tree => print_json(&service.page_tree().await?),
        Commands::Refs { .. } | Commands::Media { .. } => Ok(()),
    }
}
