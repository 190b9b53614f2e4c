//! Configuration loading and validation for brandforge.
//!
//! Application settings come from `~/.brandforge/config.toml` with
//! environment variable overrides. Brand files are YAML documents under the
//! configured brands directory, validated before any run starts.

pub mod brand;
pub mod weights;

pub use brand::{
    BrandConfig, BrandModels, CtaGuidelines, CtaOption, EvaluationPattern, EvaluatorModelConfig,
    FormattingRules, ModelSettings, RagSettings, RetrievalConfig, SearchSettings,
    StageModelConfig, VectorizationConfig, VoiceConfig, list_available_brands, load_brand,
};
pub use weights::EvaluationWeights;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.brandforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the text-generation provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub provider: ProviderConfig,

    /// Gateway retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cost ledger sink
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Directory holding `<brand>.yaml` files
    #[serde(default = "default_brands_dir")]
    pub brands_dir: PathBuf,

    /// Web search provider
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Defaults for `run` when the caller leaves a field unset
    #[serde(default)]
    pub run: RunDefaults,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Extra price families, checked before the built-in ones
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverride>,
}

fn default_brands_dir() -> PathBuf {
    PathBuf::from("config/brands")
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("retry", &self.retry)
            .field("ledger", &self.ledger)
            .field("brands_dir", &self.brands_dir)
            .field("search", &self.search)
            .field("knowledge", &self.knowledge)
            .field("run", &self.run)
            .field("evaluation", &self.evaluation)
            .field("custom_pricing", &self.custom_pricing)
            .finish()
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openrouter".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Upper bound for either retry delay.
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay() -> f64 {
    1.0
}
fn default_max_delay() -> f64 {
    60.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/api_calls.jsonl")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub base_url: String,
}

fn default_search_url() -> String {
    "https://api.tavily.com".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_url(),
        }
    }
}

/// Knowledge store seeding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON file of pre-embedded chunks loaded into the in-process store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    #[serde(default = "default_template")]
    pub template: String,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    #[serde(default)]
    pub use_cot: bool,
}

fn default_template() -> String {
    "LINKEDIN_POST_ZERO_SHOT".into()
}
fn default_max_iterations() -> u32 {
    3
}
fn default_quality_threshold() -> f64 {
    7.0
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            template: default_template(),
            max_iterations: default_max_iterations(),
            quality_threshold: default_quality_threshold(),
            use_cot: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub weights: EvaluationWeights,
}

/// Custom per-1K-token pricing for a model family, in EUR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingOverride {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.brandforge/config.toml).
    ///
    /// Environment overrides:
    /// - `BRANDFORGE_API_KEY`, then `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`
    /// - `BRANDFORGE_BASE_URL`
    /// - `TAVILY_API_KEY`
    /// - `BRANDFORGE_BRANDS_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("BRANDFORGE_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("BRANDFORGE_BASE_URL") {
            self.provider.base_url = url;
        }
        if self.search.api_key.is_none() {
            self.search.api_key = lookup("TAVILY_API_KEY");
        }
        if let Some(dir) = lookup("BRANDFORGE_BRANDS_DIR") {
            self.brands_dir = PathBuf::from(dir);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".brandforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, secs) in [
            ("base_delay_secs", self.retry.base_delay_secs),
            ("max_delay_secs", self.retry.max_delay_secs),
        ] {
            if !secs.is_finite() || !(0.0..=MAX_RETRY_DELAY_SECS).contains(&secs) {
                return Err(ConfigError::ValidationError(format!(
                    "retry.{field} must be between 0 and {MAX_RETRY_DELAY_SECS} seconds, got {secs}"
                )));
            }
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            return Err(ConfigError::ValidationError(
                "retry.max_delay_secs must be >= retry.base_delay_secs".into(),
            ));
        }
        if self.run.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "run.max_iterations must be at least 1".into(),
            ));
        }
        if !(0.0..=10.0).contains(&self.run.quality_threshold) {
            return Err(ConfigError::ValidationError(
                "run.quality_threshold must be between 0 and 10".into(),
            ));
        }
        self.evaluation
            .weights
            .validate()
            .map_err(ConfigError::ValidationError)?;

        for (pattern, price) in &self.custom_pricing {
            if price.input_per_1k < 0.0 || price.output_per_1k < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "custom_pricing.{pattern} must not be negative"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sorted names of the brands in `brands_dir`.
    pub fn list_available_brands(&self) -> Result<Vec<String>, ConfigError> {
        brand::list_available_brands(&self.brands_dir)
    }

    /// Load and validate brand `name` from `brands_dir`.
    pub fn load_brand(&self, name: &str) -> Result<BrandConfig, ConfigError> {
        brand::load_brand(&self.brands_dir, name)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            ledger: LedgerConfig::default(),
            brands_dir: default_brands_dir(),
            search: SearchConfig::default(),
            knowledge: KnowledgeConfig::default(),
            run: RunDefaults::default(),
            evaluation: EvaluationConfig::default(),
            custom_pricing: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
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

    #[error("Brand '{name}' not found in {dir}")]
    BrandNotFound { name: String, dir: PathBuf },
}

impl From<ConfigError> for brandforge_core::Error {
    fn from(e: ConfigError) -> Self {
        brandforge_core::Error::configuration(e.to_string())
    }
}
