//! Configuration for the devflow indexer.
//!
//! Loaded from a JSON file; every field has a default so partial files work.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedder::onnx::Pooling;

/// Overrides `workspace_root` when it names an existing directory.
pub const WORKSPACE_ROOT_ENV: &str = "WORKSPACE_ROOT";

/// Config file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "devflow.json";

// ── Default value functions ──────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_search_top_k() -> usize {
    5
}

fn default_model_name() -> String {
    "mock".to_string()
}

fn default_dimensions() -> usize {
    crate::db::DEFAULT_DIMENSIONS
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Database file. Defaults to `<workspace>/.devflow/devflow.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    /// Defaults to the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<String>,

    /// Extensions to index; empty means every supported one.
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default = "default_true")]
    pub recursive: bool,

    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Index element-less files as module chunks.
    #[serde(default)]
    pub module_fallback: bool,

    /// Register class elements as chunks alongside functions and methods.
    #[serde(default)]
    pub index_classes: bool,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModelConfig {
    /// `mock` or `onnx`.
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Directory with `model.onnx` and `tokenizer.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub pooling: Pooling,

    /// Feed a zeroed `token_type_ids` input (BERT-style exports).
    #[serde(default)]
    pub token_type_ids: bool,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            workspace_root: None,
            extensions: Vec::new(),
            recursive: default_true(),
            max_chunk_size: default_max_chunk_size(),
            module_fallback: false,
            index_classes: false,
            search_top_k: default_search_top_k(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
            path: None,
            pooling: Pooling::default(),
            token_type_ids: false,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields defaults. So does invalid JSON, with a warning.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        match serde_json::from_str(&data) {
            Ok(cfg) => {
                info!("Loaded configuration from {}", path.display());
                Ok(cfg)
            }
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", path.display());
                warn!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_chunk_size > 0, "max_chunk_size must be positive");
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        if let Some(db_path) = &self.db_path {
            anyhow::ensure!(!db_path.trim().is_empty(), "db_path must not be empty");
        }
        match self.model.name.as_str() {
            "mock" => {}
            "onnx" => anyhow::ensure!(
                self.model.path.as_deref().is_some_and(|p| !p.trim().is_empty()),
                "model.path is required when model.name is onnx"
            ),
            other => anyhow::bail!("unknown model.name: {other}"),
        }
        Ok(())
    }

    /// Workspace root: `$WORKSPACE_ROOT` if it is a directory, then the
    /// configured value, then the current directory.
    #[must_use]
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root_with(std::env::var(WORKSPACE_ROOT_ENV).ok())
    }

    fn workspace_root_with(&self, env_value: Option<String>) -> PathBuf {
        if let Some(dir) = env_value.filter(|v| Path::new(v).is_dir()) {
            return PathBuf::from(dir);
        }
        match &self.workspace_root {
            Some(root) => PathBuf::from(root),
            None => PathBuf::from("."),
        }
    }

    /// Database file, relative paths resolved against the workspace root.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path_in(&self.workspace_root())
    }

    fn db_path_in(&self, root: &Path) -> PathBuf {
        match &self.db_path {
            Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
            Some(p) => root.join(p),
            None => root.join(".devflow").join("devflow.db"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
