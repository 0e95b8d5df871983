//! refuge-server binary.
//!
//! Reads `refuge.toml` (or the path specified with `--config`) layered under
//! `REFUGE_*` environment variables, opens an in-process SQLite store, and
//! serves the JSON API over HTTP.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use refuge_api::{AppState, ServerConfig};
use refuge_core::label::LabelCatalog;
use refuge_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Refuge resident registry server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "refuge.toml")]
  config: PathBuf,

  /// Skip the automatic-label recalculation run at startup.
  #[arg(long)]
  no_refresh: bool,
}

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
    .add_source(config::Environment::with_prefix("REFUGE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if server_cfg.seed_default_labels {
    let seeded = store
      .seed_labels(&LabelCatalog::defaults())
      .await
      .context("failed to seed default labels")?;
    if seeded > 0 {
      tracing::info!(seeded, "default label catalog written");
    }
  }

  let state = AppState::load(store)
    .await
    .context("failed to load registry")?;

  // Age bands and "new arrival" drift with time while the server is down.
  if !cli.no_refresh {
    let changes = state
      .mutate(None, |lc, registry| Ok(lc.refresh(registry)))
      .await
      .context("startup label refresh failed")?;
    tracing::info!(changes = changes.len(), "automatic labels refreshed");
  }

  let app = refuge_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

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
