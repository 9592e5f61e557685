//! leadline-server binary.
//!
//! Reads `leadline.toml` (or the path given with `--config`), applies
//! `LEADLINE_*` environment overrides, opens the SQLite store and serves
//! the JSON API over HTTP.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `LEADLINE_INGEST__CONCURRENCY=4` or `LEADLINE_GOOGLE__CLIENT_ID=...`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use leadline_api::ApiState;
use leadline_ingest::Ingestor;
use leadline_server::ServerConfig;
use leadline_sources::PlatformClient;
use leadline_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Leadline lead ingestion server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "leadline.toml")]
  config: PathBuf,
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
    .add_source(
      config::Environment::with_prefix("LEADLINE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let platform = PlatformClient::new(
    server_cfg.meta.clone(),
    server_cfg.google.clone(),
    server_cfg.ingest.platform_timeout(),
  )
  .context("failed to build platform HTTP client")?;

  let ingestor = Ingestor::new(Arc::new(store), server_cfg.ingest.clone());
  let state = ApiState::new(ingestor, Arc::new(platform));

  let app = leadline_server::router(state, &server_cfg);
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
