//! Configuration loading, validation, and management for ironloop.
//!
//! Loads a run configuration from `ironloop.toml` with environment
//! variable overrides. Validates all settings before a run starts.

use ironloop_core::model::AnswerFormat;
use ironloop_core::tool::OnError;
use ironloop_telemetry::{BudgetConfig, BudgetStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ironloop.toml";

/// The root configuration structure.
///
/// Maps directly to `ironloop.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Loop limits and failure policy
    #[serde(default)]
    pub runtime: LoopConfig,

    /// Token budget enforcement
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Context compaction between iterations
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Result processors applied to tool outputs, in order
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,

    /// Who the run acts as
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default)]
    pub on_error: OnError,

    #[serde(default)]
    pub answer_format: AnswerFormat,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            on_error: OnError::default(),
            answer_format: AnswerFormat::default(),
        }
    }
}

impl LoopConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStrategy {
    #[default]
    None,
    SlidingWindow,
    TokenBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default)]
    pub strategy: CompactionStrategy,

    /// Iterations kept by the sliding window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Estimated-token budget for the token-based strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<usize>,

    /// Utilization at which token-based compaction starts dropping
    #[serde(default = "default_compaction_threshold")]
    pub threshold: f64,
}

fn default_window_size() -> usize {
    5
}
fn default_compaction_threshold() -> f64 {
    1.0
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            strategy: CompactionStrategy::default(),
            window_size: default_window_size(),
            token_budget: None,
            threshold: default_compaction_threshold(),
        }
    }
}

/// How `summarize` decides what shape it is looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizeStrategy {
    #[default]
    Auto,
    List,
    Map,
    Text,
}

/// Which items `sample` keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStrategy {
    /// The leading items, in order
    #[default]
    First,
    /// A uniform random subset
    Random,
    /// Evenly spaced across the list
    Distributed,
}

impl std::fmt::Display for SampleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Random => write!(f, "random"),
            Self::Distributed => write!(f, "distributed"),
        }
    }
}

/// One `[[processors]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorConfig {
    Truncate {
        #[serde(default = "default_truncate_max_size")]
        max_size: usize,
        #[serde(default = "default_truncate_marker")]
        marker: String,
    },
    Summarize {
        #[serde(default)]
        strategy: SummarizeStrategy,
        #[serde(default = "default_summary_sample_size")]
        sample_size: usize,
        #[serde(default = "default_max_summary_size")]
        max_summary_size: usize,
    },
    Sample {
        #[serde(default = "default_sample_size")]
        sample_size: usize,
        #[serde(default)]
        strategy: SampleStrategy,
    },
}

pub fn default_truncate_max_size() -> usize {
    1000
}
pub fn default_truncate_marker() -> String {
    "... [truncated]".into()
}
pub fn default_summary_sample_size() -> usize {
    3
}
pub fn default_max_summary_size() -> usize {
    500
}
pub fn default_sample_size() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_agent_name() -> String {
    "ironloop".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            domain: None,
            tenant: None,
            system_prompt: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from `path` (or `./ironloop.toml`), then apply
    /// environment overrides:
    /// - `IRONLOOP_MAX_ITERATIONS`
    /// - `IRONLOOP_TOKEN_BUDGET`
    /// - `IRONLOOP_BUDGET_STRATEGY`
    /// - `IRONLOOP_ON_ERROR`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("IRONLOOP_MAX_ITERATIONS") {
            self.runtime.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("IRONLOOP_MAX_ITERATIONS is not a number: {raw}"))
            })?;
        }

        if let Some(raw) = lookup("IRONLOOP_TOKEN_BUDGET") {
            self.budget.token_budget = Some(raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("IRONLOOP_TOKEN_BUDGET is not a number: {raw}"))
            })?);
        }

        if let Some(raw) = lookup("IRONLOOP_BUDGET_STRATEGY") {
            self.budget.strategy = raw
                .parse::<BudgetStrategy>()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if let Some(raw) = lookup("IRONLOOP_ON_ERROR") {
            self.runtime.on_error = raw.parse::<OnError>().map_err(ConfigError::ValidationError)?;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.max_iterations must be at least 1".into(),
            ));
        }

        if self.budget.token_budget == Some(0) {
            return Err(ConfigError::ValidationError(
                "budget.token_budget must be positive when set".into(),
            ));
        }

        if !(self.budget.warn_threshold > 0.0 && self.budget.warn_threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "budget.warn_threshold must be in (0.0, 1.0]".into(),
            ));
        }

        match self.compaction.strategy {
            CompactionStrategy::None => {}
            CompactionStrategy::SlidingWindow => {
                if self.compaction.window_size == 0 {
                    return Err(ConfigError::ValidationError(
                        "compaction.window_size must be at least 1".into(),
                    ));
                }
            }
            CompactionStrategy::TokenBased => {
                if self.compaction.token_budget.unwrap_or(0) == 0 {
                    return Err(ConfigError::ValidationError(
                        "compaction.token_budget is required for token_based compaction".into(),
                    ));
                }
                if self.compaction.threshold <= 0.0 {
                    return Err(ConfigError::ValidationError(
                        "compaction.threshold must be positive".into(),
                    ));
                }
            }
        }

        for (i, processor) in self.processors.iter().enumerate() {
            let size = match processor {
                ProcessorConfig::Truncate { max_size, .. } => *max_size,
                ProcessorConfig::Summarize { max_summary_size, .. } => *max_summary_size,
                ProcessorConfig::Sample { sample_size, .. } => *sample_size,
            };
            if size == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "processors[{i}] size must be positive"
                )));
            }
        }

        Ok(())
    }

    /// Settings that are valid but probably not what was meant.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.budget.token_budget.is_none() {
            warnings.push("No token budget set; usage is not tracked against a limit".to_string());
        }
        if self.compaction.strategy == CompactionStrategy::SlidingWindow
            && self.compaction.window_size > self.runtime.max_iterations as usize
        {
            warnings.push(format!(
                "compaction.window_size ({}) exceeds max_iterations ({}); the window never slides",
                self.compaction.window_size, self.runtime.max_iterations
            ));
        }
        // Usage is summed over retained iterations, so pruning lowers it.
        if self.budget.token_budget.is_some()
            && self.budget.strategy == BudgetStrategy::Halt
            && self.compaction.strategy != CompactionStrategy::None
        {
            warnings.push(
                "budget.strategy = halt with compaction enabled: pruned iterations take their usage with them, \
                 so the budget may never be reached"
                    .to_string(),
            );
        }
        warnings
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for ironloop_core::Error {
    fn from(err: ConfigError) -> Self {
        ironloop_core::Error::config(err.to_string())
    }
}
