use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use devflow::config::{Config, DEFAULT_CONFIG_FILE};
use devflow::db::{Db, VectorIndex};
use devflow::embedder::{self, Embedder, query_text};
use devflow::indexer::{IndexOptions, IndexReconciler, Indexer};
use devflow::logging;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

/// Structural code indexer
#[derive(Parser, Debug)]
#[command(name = "devflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a directory (defaults to the workspace root)
    Index {
        path: Option<PathBuf>,

        /// Only index files with this extension (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,
    },

    /// List indexed files
    Files,

    /// List the chunks of one file
    Chunks { file_id: i64 },

    /// Record or read feedback on a chunk
    #[command(subcommand)]
    Feedback(FeedbackCommand),

    /// Nearest chunks to a text query
    Search {
        query: String,

        #[arg(short)]
        k: Option<usize>,
    },

    /// Drop a file and its chunks from the index
    Forget { path: String },

    /// Index statistics
    Stats,

    /// Empty the index, feedback included, and resize it to the configured model
    Clear,
}

#[derive(Subcommand, Debug)]
enum FeedbackCommand {
    Add {
        chunk_id: String,
        feedback_type: String,

        #[arg(long)]
        comment: Option<String>,
    },
    List {
        chunk_id: String,
    },
}

fn open_db(config: &Config) -> Result<Db> {
    let path = config.db_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Db::open_with_dimensions(&path, config.model.dimensions)
        .with_context(|| format!("failed to open database {}", path.display()))
}

/// Index and search need the stored vectors to match the configured model.
fn ensure_model_width(db: &Db, config: &Config) -> Result<()> {
    if db.dimensions() != config.model.dimensions {
        bail!(
            "index at {} holds {}-dimensional vectors but model.dimensions is {}; run `devflow clear` to rebuild it",
            config.db_path().display(),
            db.dimensions(),
            config.model.dimensions
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    let mut db = open_db(&config)?;

    match cli.command {
        Command::Index {
            path,
            extensions,
            no_recursive,
        } => {
            let dir = path.unwrap_or_else(|| config.workspace_root());
            let options = IndexOptions {
                extensions: if extensions.is_empty() {
                    config.extensions.clone()
                } else {
                    extensions
                },
                recursive: config.recursive && !no_recursive,
            };

            ensure_model_width(&db, &config)?;
            let embedder = embedder::from_config(&config.model)?;
            let mut reconciler = IndexReconciler::new(Arc::new(TokioMutex::new(db)), embedder)
                .with_class_chunks(config.index_classes);
            if config.module_fallback {
                reconciler = reconciler.with_module_fallback(config.max_chunk_size);
            }

            info!("Indexing {}", dir.display());
            let summary = Indexer::new(&reconciler)
                .index_directory(&dir, &options)
                .await;
            print_json(&summary)?;
        }
        Command::Files => print_json(&db.list_files()?)?,
        Command::Chunks { file_id } => print_json(&db.list_chunks(file_id)?)?,
        Command::Feedback(FeedbackCommand::Add {
            chunk_id,
            feedback_type,
            comment,
        }) => {
            let record = db.add_feedback(&chunk_id, &feedback_type, comment.as_deref())?;
            print_json(&record)?;
        }
        Command::Feedback(FeedbackCommand::List { chunk_id }) => {
            print_json(&db.list_feedback(&chunk_id)?)?
        }
        Command::Search { query, k } => {
            ensure_model_width(&db, &config)?;
            let embedder = embedder::from_config(&config.model)?;
            let vector = embedder.embed(&query_text(&query))?;
            let hits = db.search(&vector, k.unwrap_or(config.search_top_k))?;
            print_json(&hits)?;
        }
        Command::Forget { path } => {
            let removed = db.delete_file(&path)?;
            print_json(&json!({ "path": path, "removed": removed }))?;
        }
        Command::Stats => print_json(&db.stats()?)?,
        Command::Clear => {
            db.clear()?;
            if db.dimensions() != config.model.dimensions {
                db.rebuild_vector_index(config.model.dimensions)?;
            }
            print_json(&json!({ "cleared": true, "dimensions": db.dimensions() }))?;
        }
    }

    Ok(())
}
