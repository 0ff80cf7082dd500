use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/eveleve/config.yaml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub tls: TlsConfig,
    pub travis: TravisConfig,
    pub github: GitHubConfig,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub projects: Vec<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Reading configuration from {}", path.display());
        let file = BufReader::new(
            File::open(path).with_context(|| format!("Config not found: {}", path.display()))?,
        );
        serde_yaml::from_reader(file)
            .with_context(|| format!("Couldn't parse yaml: {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TravisConfig {
    pub port: u16,
    #[serde(alias = "uri")]
    pub path: String,
    #[serde(default = "default_travis_api")]
    pub api: String,
    /// Cache the fetched public key for this many seconds; 0 fetches it per request.
    #[serde(default)]
    pub key_ttl_secs: u64,
}

fn default_travis_api() -> String { "https://api.travis-ci.com/config".to_string() }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    pub port: u16,
    #[serde(alias = "uri")]
    pub path: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    pub token: String,
    pub log_channel: String,
    pub event_channel: String,
    pub status_channel: String,
    pub command_channel: Option<String>,
    #[serde(default = "default_discord_api")]
    pub api_base: String,
    #[serde(default = "default_command_poll_secs")]
    pub command_poll_secs: u64,
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl DiscordConfig {
    pub fn command_channel(&self) -> &str {
        self.command_channel.as_deref().unwrap_or(&self.log_channel)
    }
}

fn default_discord_api() -> String { "https://discord.com/api/v10".to_string() }

fn default_command_poll_secs() -> u64 { 5 }

fn default_status_interval_secs() -> u64 { 30 }

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GitConfig {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Slots in each event stream. 0 makes every handoff a rendezvous.
    #[serde(default)]
    pub queue_depth: usize,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl RelayConfig {
    pub fn retry_interval(&self) -> Duration { Duration::from_millis(self.retry_interval_ms) }
}

impl Default for RelayConfig {
    fn default() -> Self { Self { queue_depth: 0, retry_interval_ms: default_retry_interval_ms() } }
}

fn default_retry_interval_ms() -> u64 { 100 }
