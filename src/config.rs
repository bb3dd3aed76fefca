/// Configuration module for ddoksori-chat.
///
/// Handles loading, validating, and providing default configuration values.
/// Command-line flags are applied on top of the loaded file by the binary.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conversation::RequestOptions;
use crate::streaming::StreamingOptions;

/// Config file used when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "ddoksori.json";

// ── Default value functions ──────────────────────────────────────────

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_words_per_chunk() -> usize {
    2
}

fn default_delay_ms() -> u64 {
    30
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Restrict retrieval to these chunk types (e.g. `decision`, `reasoning`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_types: Option<Vec<String>>,

    /// Restrict retrieval to these agencies (e.g. `kca`, `ecmc`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agencies: Option<Vec<String>>,

    /// No timeout when unset: a hung backend keeps the spinner going.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub streaming: StreamingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_words_per_chunk")]
    pub words_per_chunk: usize,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            top_k: default_top_k(),
            chunk_types: None,
            agencies: None,
            request_timeout_secs: None,
            streaming: StreamingConfig::default(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            words_per_chunk: default_words_per_chunk(),
            delay_ms: default_delay_ms(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the working directory.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");

        // Empty filter lists mean "no filter"; the backend treats [] as "match nothing".
        if cfg.chunk_types.as_ref().is_some_and(Vec::is_empty) {
            cfg.chunk_types = None;
        }
        if cfg.agencies.as_ref().is_some_and(Vec::is_empty) {
            cfg.agencies = None;
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.api_base_url.trim().is_empty(),
            "api_base_url must not be empty"
        );
        anyhow::ensure!(
            self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"),
            "api_base_url must start with http:// or https://"
        );
        anyhow::ensure!(self.top_k > 0, "top_k must be positive");
        anyhow::ensure!(
            self.streaming.words_per_chunk > 0,
            "streaming.words_per_chunk must be positive"
        );
        if let Some(secs) = self.request_timeout_secs {
            anyhow::ensure!(secs > 0, "request_timeout_secs must be positive when set");
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Filters sent with every chat request.
    #[must_use]
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            top_k: Some(self.top_k),
            chunk_types: self.chunk_types.clone(),
            agencies: self.agencies.clone(),
        }
    }

    #[must_use]
    pub fn streaming_options(&self) -> StreamingOptions {
        StreamingOptions {
            words_per_chunk: self.streaming.words_per_chunk,
            delay_ms: self.streaming.delay_ms,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
