//! leadhive server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and either serves the read-only JSON API or runs
//! one ingestion pass over a JSON import file.
//!
//! The daily scheduler and the site-specific scrapers live outside this
//! repository; a scraper deployment invokes `leadhive ingest` with its own
//! adapters wired in, or drops records into a file for the built-in import
//! adapter.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use leadhive_core::store::LeadStore as _;
use leadhive_ingest::{IngestCoordinator, JsonFileAdapter};
use leadhive_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,

  /// Optional city filter passed to adapters.
  #[serde(default)]
  city: Option<String>,

  /// Per-call result cap passed to adapters.
  #[serde(default = "default_limit")]
  per_category_limit: usize,

  /// Category keys to ingest; empty means every seeded category.
  #[serde(default)]
  categories: Vec<String>,
}

fn default_store_path() -> PathBuf { PathBuf::from("leadhive.db") }
fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_limit() -> usize { 100 }

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "leadhive — lead aggregation pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the read-only JSON API.
  Serve,
  /// Run one ingestion pass over a JSON import file.
  Ingest {
    /// JSON file containing an array of raw records.
    #[arg(long)]
    import: PathBuf,

    /// Source label to stamp on imported records.
    #[arg(long)]
    source: Option<String>,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LEADHIVE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command {
    Command::Serve => serve(store, &server_cfg).await,
    Command::Ingest { import, source } => {
      ingest(store, &server_cfg, import, source).await
    }
  }
}

async fn serve(store: Arc<SqliteStore>, cfg: &ServerConfig) -> anyhow::Result<()> {
  let app = leadhive_api::api_router(store)
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}");

  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn ingest(
  store: Arc<SqliteStore>,
  cfg: &ServerConfig,
  import: PathBuf,
  source: Option<String>,
) -> anyhow::Result<()> {
  let mut adapter = JsonFileAdapter::new(import);
  if let Some(source) = source {
    adapter = adapter.with_source(source);
  }

  let categories = if cfg.categories.is_empty() {
    store
      .list_categories()
      .await
      .context("failed to list categories")?
      .into_iter()
      .map(|c| c.key)
      .collect()
  } else {
    cfg.categories.clone()
  };

  let coordinator = IngestCoordinator::new(store, vec![Box::new(adapter)])
    .with_city(cfg.city.clone())
    .with_per_category_limit(cfg.per_category_limit);

  let summary = coordinator
    .run(&categories)
    .await
    .context("ingestion run failed")?;

  let session = &summary.session;
  tracing::info!(
    status = ?session.status,
    total = session.total_scraped,
    new = session.new_leads,
    updated = session.updated_leads,
    errors = session.errors_count,
    duration_seconds = session.duration_seconds,
    "run finished"
  );

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
