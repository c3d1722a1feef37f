//! newsdesk server binary.
//!
//! Reads `newsdesk.toml` (or the path given with `--config`), opens the
//! SQLite store, starts the task dispatcher and either serves the JSON API
//! (`serve`, the default) or runs one topic through the whole pipeline
//! (`run`) and prints the report.

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use newsdesk_api::ApiState;
use newsdesk_core::{Topic, post::Channel, verify::Verifier};
use newsdesk_pipeline::{
  Dispatcher, Orchestrator,
  channel::ChannelSet,
  provider::{
    Analyst, HttpAnalyst, HttpResearchProvider, OfflineAnalyst, OfflineResearch,
    ResearchProvider,
  },
  stages::{self, Stages},
};
use newsdesk_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{Settings, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Newsdesk analysis pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "newsdesk.toml", env = "NEWSDESK_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API.
  Serve,
  /// Run one topic end to end and print the report as JSON.
  Run {
    #[arg(long, value_parser = parse_topic)]
    topic:        Topic,
    #[arg(long, default_value_t = 6)]
    window_hours: u32,
    /// Channels to publish to; nothing is published when omitted.
    #[arg(long, value_delimiter = ',', value_parser = parse_channel)]
    channels:     Vec<Channel>,
  },
}

fn parse_topic(s: &str) -> Result<Topic, String> { Topic::parse(s).map_err(|e| e.to_string()) }

fn parse_channel(s: &str) -> Result<Channel, String> {
  Channel::parse(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store_path = expand_tilde(&settings.server.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let orchestrator = build_orchestrator(&settings, store)?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&settings, orchestrator).await,
    Command::Run { topic, window_hours, channels } => {
      let report = orchestrator
        .run_topic(topic, window_hours, channels)
        .await
        .context("pipeline run failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
      Ok(())
    }
  }
}

fn build_orchestrator(
  settings: &Settings,
  store: Arc<SqliteStore>,
) -> anyhow::Result<Orchestrator<SqliteStore>> {
  let verifier =
    Verifier::new(settings.verifier.clone()).context("invalid verifier configuration")?;

  let research: Arc<dyn ResearchProvider> = match &settings.research.endpoint {
    Some(endpoint) => Arc::new(HttpResearchProvider::new(endpoint, &settings.research)?),
    None => {
      tracing::warn!("no research endpoint configured; using offline research provider");
      Arc::new(OfflineResearch)
    }
  };
  let analyst: Arc<dyn Analyst> = match &settings.analyst.endpoint {
    Some(endpoint) => Arc::new(HttpAnalyst::new(endpoint, &settings.analyst)?),
    None => {
      tracing::warn!("no analyst endpoint configured; using offline analyst");
      Arc::new(OfflineAnalyst)
    }
  };
  let channels = ChannelSet::from_config(&settings.channels)
    .context("failed to build channel adapters")?;

  let stages = Arc::new(Stages {
    research,
    analyst,
    channels,
    verifier,
    dedupe: settings.dedupe.clone(),
    max_facts: settings.max_facts,
    site_url: settings.server.site_url.clone(),
    channel_timeout: settings.channels.timeout(),
    ..Stages::new(store.clone())
  });

  let dispatcher = Dispatcher::start(stages::registry(stages), settings.dispatcher.clone())
    .context("failed to start dispatcher")?;
  Ok(Orchestrator::new(dispatcher, store, settings.orchestration.clone()))
}

async fn serve(settings: &Settings, orchestrator: Orchestrator<SqliteStore>) -> anyhow::Result<()> {
  let state = ApiState {
    orchestrator,
    site_url: settings.server.site_url.clone(),
    site_title: settings.server.site_title.clone(),
  };
  let app = newsdesk_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", settings.server.host, settings.server.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
