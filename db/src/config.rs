//! Daybook configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;

/// Main Daybook configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session timeouts and retention
    pub coordinator: CoordinatorConfig,

    /// Journal storage
    pub storage: StorageConfig,

    /// Optional chat model for action decisions
    pub model: ModelConfig,

    /// Deterministic decision tuning
    pub decision: DecisionConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.decision.dedup_similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(eyre::eyre!(
                "decision.dedup-similarity-threshold must be within 0..=1, got {}",
                threshold
            ));
        }
        if self.decision.candidate_limit == 0 {
            return Err(eyre::eyre!("decision.candidate-limit must be at least 1"));
        }
        if self.coordinator.resolver_timeout_ms == 0 || self.coordinator.storage_timeout_ms == 0 {
            return Err(eyre::eyre!("coordinator timeouts must be greater than zero"));
        }
        if self.coordinator.reap_interval_secs == 0 {
            return Err(eyre::eyre!("coordinator.reap-interval-secs must be greater than zero"));
        }
        if (self.model.enabled || self.model.editor.enabled) && std::env::var(&self.model.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Model API key not found. Set the {} environment variable or disable the model.",
                self.model.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .daybook.yml
        let local_config = PathBuf::from(".daybook.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/daybook/daybook.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("daybook").join("daybook.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "db-path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/daybook on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("daybook"))
            .unwrap_or_else(|| PathBuf::from(".daybook"))
            .join("journal.sqlite3")
            .to_string_lossy()
            .into_owned();

        Self { db_path }
    }
}

/// Chat model used to decide actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Use the model; the deterministic decision is used otherwise
    pub enabled: bool,

    /// OpenAI-compatible API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    pub temperature: f32,

    /// Extra attempts after invalid output
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Model that rewrites entry text; shares the endpoint and key above
    pub editor: EditorModelConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            max_retries: 2,
            timeout_ms: 20_000,
            editor: EditorModelConfig::default(),
        }
    }
}

/// Chat model used to polish entry text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorModelConfig {
    pub enabled: bool,

    /// Model identifier; the decision model's when unset
    pub model: Option<String>,

    pub temperature: f32,
}

impl Default for EditorModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: None,
            temperature: 0.2,
        }
    }
}

/// Deterministic decision tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Similarity at which new text counts as a revision of an existing entry
    #[serde(rename = "dedup-similarity-threshold")]
    pub dedup_similarity_threshold: f64,

    /// Most similar entries considered per proposal
    #[serde(rename = "candidate-limit")]
    pub candidate_limit: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            dedup_similarity_threshold: 0.88,
            candidate_limit: 10,
        }
    }
}
