//! Configuration module for the document index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LEXVEC_` and use double underscores
//! to separate nested levels:
//! - `LEXVEC_SEARCH__THRESHOLD=0.4` sets `search.threshold`
//! - `LEXVEC_EMBEDDING__MODEL=hashing` sets `embedding.model`
//! - `LEXVEC_PERSISTENCE__AUTO_SAVE=false` sets `persistence.auto_save`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".lexvec";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the index snapshot
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Snapshot persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings ("hashing" selects the offline encoder)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded models are cached (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while downloading the model
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Number of results returned when the caller does not specify one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Minimum similarity score for search results
    #[serde(default = "default_similarity_threshold")]
    pub threshold: f32,

    /// Candidates fetched per requested result, to absorb tombstones
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersistenceConfig {
    /// Save the snapshot after every mutation
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log filter, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".lexvec/index")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_limit() -> usize {
    10
}
fn default_similarity_threshold() -> f32 {
    crate::semantic::thresholds::DEFAULT
}
fn default_overfetch_factor() -> usize {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            debug: false,
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            threshold: default_similarity_threshold(),
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { auto_save: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay inside field names
            .merge(Env::prefixed("LEXVEC_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for a .lexvec directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Reject settings the index cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.search.overfetch_factor == 0 {
            return Err("search.overfetch_factor must be at least 1".to_string());
        }
        if !self.search.threshold.is_finite() {
            return Err("search.threshold must be a finite number".to_string());
        }
        if self.search.default_limit == 0 {
            return Err("search.default_limit must be at least 1".to_string());
        }
        if self.embedding.model.trim().is_empty() {
            return Err("embedding.model cannot be empty".to_string());
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# lexvec configuration file

# Version of the configuration schema
version = 1

# Directory holding the index snapshot (vectors.bin, metadata.json, manifest.json)
index_path = ".lexvec/index"

# Global debug mode
debug = false

[embedding]
# Model to use for embeddings. Any fastembed text model name works, e.g.
# "AllMiniLML6V2", "BGESmallENV15". Use "hashing" (or "hashing-<dim>") for
# the offline encoder that needs no download.
model = "AllMiniLML6V2"

# Show download progress the first time a model is fetched
show_download_progress = true

[search]
# Results returned when no limit is given
default_limit = 10

# Minimum similarity score (-1.0 to 1.0) for search results
threshold = 0.5

# Candidates fetched per requested result before dropping removed documents
overfetch_factor = 4

[persistence]
# Save the snapshot after every add/update/remove
auto_save = true

[logging]
# Default log filter; RUST_LOG takes precedence when set
level = "info"
"#;

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}
