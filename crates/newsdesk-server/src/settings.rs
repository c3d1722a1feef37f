//! Layered server configuration.
//!
//! Values come from the TOML file named with `--config` (optional), then
//! from `NEWSDESK_`-prefixed environment variables, with `__` separating
//! nested keys: `NEWSDESK_SERVER__PORT=9000`,
//! `NEWSDESK_CHANNELS__TELEGRAM__TOKEN=...`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use newsdesk_core::{dedupe::DedupeConfig, verify::VerifierConfig};
use newsdesk_pipeline::{
  DispatcherConfig, OrchestrationConfig, channel::ChannelsConfig, provider::EndpointConfig,
  stages::DEFAULT_MAX_FACTS,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Public base URL posts are linked under.
  pub site_url:   String,
  pub site_title: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_owned(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/newsdesk/newsdesk.db"),
      site_url:   "https://example.com".to_owned(),
      site_title: "Newsdesk".to_owned(),
    }
  }
}

fn default_max_facts() -> usize { DEFAULT_MAX_FACTS }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub server:        ServerConfig,
  #[serde(default)]
  pub dispatcher:    DispatcherConfig,
  #[serde(default)]
  pub orchestration: OrchestrationConfig,
  #[serde(default)]
  pub verifier:      VerifierConfig,
  #[serde(default)]
  pub dedupe:        DedupeConfig,
  #[serde(default)]
  pub channels:      ChannelsConfig,
  #[serde(default)]
  pub research:      EndpointConfig,
  #[serde(default)]
  pub analyst:       EndpointConfig,
  #[serde(default = "default_max_facts")]
  pub max_facts:     usize,
}

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("NEWSDESK")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
