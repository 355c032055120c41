//! codeseek binary — thin CLI shell over the [`codeseek`] library crate.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use codeseek::cache::EmbeddingCache;
use codeseek::config::{HomeDirs, Settings};
use codeseek::embed::create_provider;
use codeseek::index::{run_index, IndexJob, IndexMode};
use codeseek::rerank::mmr_rerank;
use codeseek::store::Store;
use codeseek::summarize::create_summarizer;

// ---------------------------------------------------------------------------
// CLI definition (clap derive)
// ---------------------------------------------------------------------------

/// Local code intelligence: semantic search, code graph queries, and a
/// resident query daemon.
#[derive(Parser)]
#[command(name = "codeseek", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new index over a source root
    Index {
        /// Index name
        name: String,
        /// Source root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Embedding model, provider:model (overrides config)
        #[arg(long)]
        model: Option<String>,
        /// Summarize extracted symbols with this provider:model
        #[arg(long)]
        summarize: Option<String>,
    },
    /// Incrementally update an existing index
    Update {
        name: String,
        /// Restart a failed index from scratch
        #[arg(long)]
        retry: bool,
        #[arg(long)]
        summarize: Option<String>,
    },
    /// Delete an index and its stored data
    Delete { name: String },
    /// List indexes
    List,
    /// Semantic search (through the daemon when running, else directly)
    Search {
        name: String,
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.7)]
        diversity: f32,
    },
    /// Watch an index's root and re-run update on changes
    Watch { name: String },
    /// Embedding cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Check embedding (and optionally summarization) provider health
    Health {
        /// provider:model to probe (default: configured model)
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        summarizer: Option<String>,
    },
    /// Daemon lifecycle and queries
    #[cfg(unix)]
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show entry counts per model
    Stats,
    /// Drop every cached embedding
    Clear,
}

#[cfg(unix)]
#[derive(Subcommand)]
enum DaemonCommands {
    /// Start a daemon for an index
    Start { index: String },
    /// Stop a running daemon
    Stop { index: String },
    /// Show one daemon's status
    Status { index: String },
    /// List all daemons
    List,
    /// Show a daemon's log
    Logs {
        index: String,
        #[arg(long)]
        tail: Option<usize>,
    },
    /// Send one JSON-RPC request to a running daemon
    Query {
        index: String,
        method: String,
        /// Params as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Run the daemon in the foreground (used internally by `daemon start`)
    #[command(hide = true)]
    Run {
        #[arg(long)]
        index: String,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings_for_root(root: &std::path::Path, model: Option<&str>) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(root)?;
    if let Some(model) = model {
        settings.model = model.to_string();
    }
    Ok(settings)
}

fn run_job(
    home: &HomeDirs,
    name: &str,
    root: Option<&std::path::Path>,
    mode: IndexMode,
    settings: &Settings,
    summarize: Option<&str>,
) -> anyhow::Result<()> {
    let provider = create_provider(&settings.model)?;
    let mut cache = EmbeddingCache::open(&home.cache_db())?;
    let summarizer = match summarize.or(settings.summary_model.as_deref()) {
        Some(model) => Some(create_summarizer(model)?),
        None => None,
    };
    let report = run_index(
        &IndexJob { home, name, root, mode, settings },
        provider.as_ref(),
        &mut cache,
        summarizer.as_deref(),
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Direct (daemon-less) semantic search against the store.
fn direct_search(
    home: &HomeDirs,
    name: &str,
    query: &str,
    limit: usize,
    diversity: f32,
) -> anyhow::Result<serde_json::Value> {
    let store = Store::open(home, name)?;
    let provider = create_provider(&store.meta().model)?;
    let vectors = provider.embed(&[query.to_string()])?;
    let qvec = vectors.into_iter().next().context("empty query embedding")?;
    let hits = store.search_by_vector(&qvec, limit)?;
    let reranked = mmr_rerank(hits, diversity)?;
    let results: Vec<serde_json::Value> = reranked
        .into_iter()
        .map(|h| {
            json!({
                "relPath": h.chunk.rel_path,
                "startLine": h.chunk.start_line,
                "endLine": h.chunk.end_line,
                "content": h.chunk.content,
                "_score": h.distance,
                "similarity": 1.0 - h.distance,
            })
        })
        .collect();
    Ok(json!({ "results": results }))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("codeseek=info".parse().expect("static directive parses")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let home = HomeDirs::open()?;

    match cli.command {
        Commands::Index { name, root, model, summarize } => {
            let root = match root {
                Some(r) => r,
                None => std::env::current_dir()?,
            };
            let settings = settings_for_root(&root, model.as_deref())?;
            run_job(
                &home,
                &name,
                Some(&root),
                IndexMode::Create,
                &settings,
                summarize.as_deref(),
            )?;
        }
        Commands::Update { name, retry, summarize } => {
            let meta = Store::open(&home, &name)?.meta().clone();
            let settings = settings_for_root(&meta.root, Some(&meta.model))?;
            let mode = if retry { IndexMode::Retry } else { IndexMode::Update };
            run_job(&home, &name, None, mode, &settings, summarize.as_deref())?;
        }
        Commands::Delete { name } => {
            Store::delete(&home, &name)?;
            println!("deleted index '{name}'");
        }
        Commands::List => {
            let indexes = Store::list(&home)?;
            println!("{}", serde_json::to_string_pretty(&indexes)?);
        }
        Commands::Search { name, query, limit, diversity } => {
            #[cfg(unix)]
            {
                if codeseek::manager::status(&home, &name).running {
                    let response = codeseek::manager::query(
                        &home,
                        &name,
                        "search",
                        json!({ "query": query, "limit": limit, "diversity": diversity }),
                    )?;
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    return Ok(());
                }
            }
            let results = direct_search(&home, &name, &query, limit, diversity)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Watch { name } => {
            let meta = Store::open(&home, &name)?.meta().clone();
            info!(index = name.as_str(), root = %meta.root.display(), "watching for changes");
            let (tx, rx) = std::sync::mpsc::channel::<usize>();
            let _handle = codeseek::watch::watch_root(&meta.root, move |batch| {
                let _ = tx.send(batch.len());
            })
            .context("could not start file watcher")?;

            while let Ok(changed) = rx.recv() {
                info!(changed, "change batch received, updating index");
                let settings = settings_for_root(&meta.root, Some(&meta.model))?;
                run_job(&home, &name, None, IndexMode::Update, &settings, None)?;
            }
        }
        Commands::Cache { command } => {
            let cache = EmbeddingCache::open(&home.cache_db())?;
            match command {
                CacheCommands::Stats => {
                    println!("{}", serde_json::to_string_pretty(&cache.stats()?)?);
                }
                CacheCommands::Clear => {
                    let removed = cache.clear()?;
                    println!("cleared {removed} cached embeddings");
                }
            }
        }
        Commands::Health { model, summarizer } => {
            let model = match model {
                Some(m) => m,
                None => Settings::load(&std::env::current_dir()?)?.model,
            };
            let provider = create_provider(&model)?;
            let health = provider.health_check()?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            if let Some(model) = summarizer {
                let s = create_summarizer(&model)?;
                println!("{}", serde_json::to_string_pretty(&s.health_check()?)?);
            }
        }
        #[cfg(unix)]
        Commands::Daemon { command } => match command {
            DaemonCommands::Start { index } => {
                let status = codeseek::manager::start(&home, &index)?;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            DaemonCommands::Stop { index } => {
                codeseek::manager::stop(&home, &index)?;
                println!("stopped daemon for '{index}'");
            }
            DaemonCommands::Status { index } => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&codeseek::manager::status(&home, &index))?
                );
            }
            DaemonCommands::List => {
                println!("{}", serde_json::to_string_pretty(&codeseek::manager::list(&home)?)?);
            }
            DaemonCommands::Logs { index, tail } => {
                print!("{}", codeseek::manager::logs(&home, &index, tail)?);
            }
            DaemonCommands::Query { index, method, params } => {
                let params: serde_json::Value =
                    serde_json::from_str(&params).context("--params must be a JSON object")?;
                let response = codeseek::manager::query(&home, &index, &method, params)?;
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            DaemonCommands::Run { index } => {
                // the only async surface; everything else is a synchronous
                // pipeline and must not run inside a runtime (the embedding
                // client is a blocking HTTP client)
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(codeseek::daemon::run_daemon(&home, &index))?;
            }
        },
    }

    Ok(())
}
