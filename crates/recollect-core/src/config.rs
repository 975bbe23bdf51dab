//! Configuration
//!
//! Every recognized option is a named field with its own default. Loading a
//! partial file fills the missing fields from [`Config::default`]; overrides
//! go through [`Config::set`], one field at a time.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "RECOLLECT_DATA_DIR";

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "recollect.db";

/// Auto-save state file name inside the data directory
pub const STATE_FILE: &str = "auto-save-state.json";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.json";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Configuration error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    #[error("Config IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON for the schema
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// An unrecognized key was passed to `set`
    #[error("Unknown config key: {0}")]
    UnknownKey(String),
    /// A value could not be parsed for its key
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
    /// A value is out of its permitted range
    #[error("Invalid config: {0}")]
    Validation(String),
    /// Platform directories could not be determined
    #[error("Could not determine project directories")]
    NoProjectDirs,
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Tunables of the hybrid ranking engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// RRF damping constant
    pub rrf_k: f64,
    /// RRF weight of the vector list
    pub vector_weight: f64,
    /// RRF weight of the keyword list
    pub keyword_weight: f64,
    /// Recency half-life in days
    pub half_life_days: f64,
    /// Share of the fused score kept regardless of age
    pub decay_floor: f64,
    /// Synthetic score step of the keyword fallback (`1 - step * rank`)
    pub keyword_fallback_step: f64,
    /// Each candidate list is fetched at `limit * candidate_multiplier`
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            half_life_days: 7.0,
            decay_floor: 0.7,
            keyword_fallback_step: 0.1,
            candidate_multiplier: 2,
        }
    }
}

/// Paragraph and chunk sizes of the chunking pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingConfig {
    /// Paragraphs longer than this are re-split at sentence boundaries
    pub paragraph_ceiling: usize,
    /// Sentence accumulation stops before exceeding this size
    pub soft_cap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            paragraph_ceiling: 1000,
            soft_cap: 800,
        }
    }
}

/// Immutable configuration snapshot for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Context percentage at which a transcript is archived once per session
    pub auto_save_threshold: f64,
    /// Context percentage at which archive + clear is forced
    pub auto_clear_threshold: f64,
    /// Whether the auto-clear escalation is active
    pub auto_clear_enabled: bool,
    /// Token budget of a restoration context
    pub restoration_token_budget: usize,
    /// Maximum fragments in a restoration context
    pub restoration_message_count: usize,
    /// Chunks shorter than this (in characters) are discarded
    pub min_content_length: usize,
    /// Model context window used to estimate utilization from transcripts
    pub context_window_tokens: u64,
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// Use the FTS5 index for keyword candidates
    pub keyword_index: bool,
    /// Ranking tunables
    pub retrieval: RetrievalConfig,
    /// Chunking sizes
    pub chunking: ChunkingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_save_threshold: 70.0,
            auto_clear_threshold: 90.0,
            auto_clear_enabled: false,
            restoration_token_budget: 1000,
            restoration_message_count: 5,
            min_content_length: 50,
            context_window_tokens: 200_000,
            data_dir: None,
            keyword_index: true,
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

/// Keys accepted by [`Config::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "autoSaveThreshold",
    "autoClearThreshold",
    "autoClearEnabled",
    "restorationTokenBudget",
    "restorationMessageCount",
    "minContentLength",
    "contextWindowTokens",
    "dataDir",
    "keywordIndex",
    "retrieval.rrfK",
    "retrieval.vectorWeight",
    "retrieval.keywordWeight",
    "retrieval.halfLifeDays",
    "retrieval.decayFloor",
    "retrieval.keywordFallbackStep",
    "retrieval.candidateMultiplier",
    "chunking.paragraphCeiling",
    "chunking.softCap",
];

impl Config {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from `path` (or the default location), falling back to defaults
    /// when the file does not exist, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str::<Config>(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Config::default()
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.trim().is_empty()
        {
            config.data_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let percent = 0.0..=100.0;
        if !percent.contains(&self.auto_save_threshold) {
            return Err(ConfigError::Validation(format!(
                "autoSaveThreshold must be within 0-100, got {}",
                self.auto_save_threshold
            )));
        }
        if !percent.contains(&self.auto_clear_threshold) {
            return Err(ConfigError::Validation(format!(
                "autoClearThreshold must be within 0-100, got {}",
                self.auto_clear_threshold
            )));
        }
        if self.auto_clear_threshold < self.auto_save_threshold {
            return Err(ConfigError::Validation(
                "autoClearThreshold must not be below autoSaveThreshold".to_string(),
            ));
        }
        if self.restoration_token_budget == 0 || self.restoration_message_count == 0 {
            return Err(ConfigError::Validation(
                "restoration budget and message count must be positive".to_string(),
            ));
        }
        if self.context_window_tokens == 0 {
            return Err(ConfigError::Validation(
                "contextWindowTokens must be positive".to_string(),
            ));
        }

        let r = &self.retrieval;
        if r.rrf_k < 0.0 || r.vector_weight < 0.0 || r.keyword_weight < 0.0 {
            return Err(ConfigError::Validation(
                "RRF constant and weights must not be negative".to_string(),
            ));
        }
        if r.half_life_days <= 0.0 {
            return Err(ConfigError::Validation(
                "retrieval.halfLifeDays must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&r.decay_floor) {
            return Err(ConfigError::Validation(
                "retrieval.decayFloor must be within 0-1".to_string(),
            ));
        }
        if r.keyword_fallback_step <= 0.0 {
            return Err(ConfigError::Validation(
                "retrieval.keywordFallbackStep must be positive".to_string(),
            ));
        }
        if r.candidate_multiplier == 0 {
            return Err(ConfigError::Validation(
                "retrieval.candidateMultiplier must be positive".to_string(),
            ));
        }

        let c = &self.chunking;
        if c.soft_cap == 0 || c.paragraph_ceiling == 0 {
            return Err(ConfigError::Validation(
                "chunk sizes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Override a single field by its JSON key
    ///
    /// The result is validated; on error the config is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        match key {
            "autoSaveThreshold" => next.auto_save_threshold = parse_f64(key, value)?,
            "autoClearThreshold" => next.auto_clear_threshold = parse_f64(key, value)?,
            "autoClearEnabled" => next.auto_clear_enabled = parse_bool(key, value)?,
            "restorationTokenBudget" => next.restoration_token_budget = parse_usize(key, value)?,
            "restorationMessageCount" => next.restoration_message_count = parse_usize(key, value)?,
            "minContentLength" => next.min_content_length = parse_usize(key, value)?,
            "contextWindowTokens" => {
                next.context_window_tokens = value.trim().parse().map_err(|_| invalid(key, value, "an integer"))?
            }
            "dataDir" => {
                next.data_dir = match value.trim() {
                    "" | "default" => None,
                    dir => Some(PathBuf::from(dir)),
                }
            }
            "keywordIndex" => next.keyword_index = parse_bool(key, value)?,
            "retrieval.rrfK" => next.retrieval.rrf_k = parse_f64(key, value)?,
            "retrieval.vectorWeight" => next.retrieval.vector_weight = parse_f64(key, value)?,
            "retrieval.keywordWeight" => next.retrieval.keyword_weight = parse_f64(key, value)?,
            "retrieval.halfLifeDays" => next.retrieval.half_life_days = parse_f64(key, value)?,
            "retrieval.decayFloor" => next.retrieval.decay_floor = parse_f64(key, value)?,
            "retrieval.keywordFallbackStep" => {
                next.retrieval.keyword_fallback_step = parse_f64(key, value)?
            }
            "retrieval.candidateMultiplier" => {
                next.retrieval.candidate_multiplier = parse_usize(key, value)?
            }
            "chunking.paragraphCeiling" => next.chunking.paragraph_ceiling = parse_usize(key, value)?,
            "chunking.softCap" => next.chunking.soft_cap = parse_usize(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Resolved data directory (override, or platform data dir)
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    /// Path of the fragment database
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(DATABASE_FILE))
    }

    /// Path of the persisted auto-save state
    pub fn state_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join(STATE_FILE))
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("dev", "recollect", "recollect").ok_or(ConfigError::NoProjectDirs)
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, value, "a number"))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "a non-negative integer"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}
