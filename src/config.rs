use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to mailsage.toml - where the config was loaded from, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub persona: PersonaConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

// ── Analysis endpoint ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Chat-completions endpoint, e.g. a vLLM or OpenAI-compatible server.
    #[serde(default = "default_analysis_url")]
    pub base_url: String,
    /// Never written back to disk; prefer MAILSAGE_ANALYSIS_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_analysis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_analysis_url() -> String {
    "http://localhost:8001/v1/chat/completions".into()
}

fn default_model() -> String {
    "qwen2-vl-7b-instruct".into()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

fn default_analysis_timeout_ms() -> u64 {
    60_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_analysis_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_analysis_timeout_ms(),
        }
    }
}

// ── Delivery endpoint ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_url")]
    pub base_url: String,
    /// Never written back to disk; prefer MAILSAGE_DELIVERY_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_delivery_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_delivery_url() -> String {
    "https://api.resend.com/emails".into()
}

fn default_from_address() -> String {
    "feedback@mailsage.dev".into()
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: default_delivery_url(),
            api_key: None,
            from_address: default_from_address(),
            timeout_ms: default_delivery_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

// ── Persona store + cache ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Routing key of last resort; its absence from the store is fatal.
    #[serde(default = "default_persona_id")]
    pub default_persona_id: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Interval for the expired-entry sweep; 0 disables the sweep task.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_database_path() -> String {
    "mailsage.db".into()
}

fn default_persona_id() -> String {
    "default-analyst".into()
}

fn default_cache_ttl_secs() -> u64 {
    3_600
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_persona_id: default_persona_id(),
            cache_ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

// ── Inbound content limits ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_download_timeout_ms")]
    pub download_timeout_ms: u64,
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_download_timeout_ms() -> u64 {
    15_000
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            download_timeout_ms: default_download_timeout_ms(),
        }
    }
}

// ── Gateway front door ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Sender addresses permitted to trigger analysis. Empty means open.
    #[serde(default)]
    pub allowed_senders: Vec<String>,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

fn default_body_limit_bytes() -> usize {
    64 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_senders: Vec::new(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("mailsage.toml"),
            analysis: AnalysisConfig::default(),
            delivery: DeliveryConfig::default(),
            persona: PersonaConfig::default(),
            content: ContentConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    /// Load from the given path, or defaults when the file does not exist.
    /// API keys are overridable from the environment so they never have to
    /// live in the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            let mut parsed: Config =
                toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
            parsed.config_path = path.to_path_buf();
            parsed
        } else {
            Config {
                config_path: path.to_path_buf(),
                ..Config::default()
            }
        };

        if let Ok(key) = std::env::var("MAILSAGE_ANALYSIS_API_KEY") {
            config.analysis.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("MAILSAGE_DELIVERY_API_KEY") {
            config.delivery.api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "analysis.timeout_ms must be positive".into(),
            ));
        }
        if self.delivery.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "delivery.timeout_ms must be positive".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(ConfigError::Validation(format!(
                "analysis.temperature {} out of range 0.0..=2.0",
                self.analysis.temperature
            )));
        }
        if self.persona.default_persona_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "persona.default_persona_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}
