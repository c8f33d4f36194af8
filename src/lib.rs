//! Cancellation and registration guidance pipeline
//!
//! Given a free-text service name, runs a headless-browser web search, asks a
//! generative model for a structured JSON answer, probes the returned URL, and
//! persists the normalized record.

mod browser;
pub mod browser_setup;
pub mod info;
pub mod model;
pub mod prompt;
pub mod resolver;
pub mod store;
mod utils;
pub mod validator;
pub mod web_search;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Search collector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Static HTML results endpoint; the query is appended as `q`
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Number of results handed to the prompt
    #[serde(default = "default_search_limit")]
    pub limit: usize,

    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,

    #[serde(default = "default_selector_timeout_secs")]
    pub selector_timeout_secs: u64,
}

/// URL probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Per-probe timeout (HEAD and the GET fallback each get this much)
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_user_agent")]
    pub user_agent: String,
}

/// Generative model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Orchestration settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Optional end-to-end deadline for one resolve call. Unset means only
    /// the per-component timeouts apply.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Record per-stage messages into `debugLogs` on cancellation records
    #[serde(default)]
    pub collect_debug_logs: bool,
}

/// Hosted data store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_table")]
    pub table: String,

    #[serde(default = "default_store_url_env")]
    pub url_env: String,

    #[serde(default = "default_store_key_env")]
    pub key_env: String,
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false  // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_search_url() -> String {
    web_search::SEARCH_URL.to_string()
}
fn default_search_limit() -> usize {
    web_search::DEFAULT_LIMIT
}
fn default_page_load_timeout_secs() -> u64 {
    30
}
fn default_selector_timeout_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_probe_user_agent() -> String {
    utils::constants::PROBE_USER_AGENT.to_string()
}

fn default_model_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_model_name() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_store_table() -> String {
    "subscriptions".to_string()
}
fn default_store_url_env() -> String {
    "SUPABASE_URL".to_string()
}
fn default_store_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            limit: default_search_limit(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
            selector_timeout_secs: default_selector_timeout_secs(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout_secs(),
            user_agent: default_probe_user_agent(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_model_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: default_store_table(),
            url_env: default_store_url_env(),
            key_env: default_store_key_env(),
        }
    }
}

impl Config {
    /// Check that configured timeouts stay inside the supported bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_navigation_timeout(
            "search.page_load_timeout_secs",
            self.search.page_load_timeout_secs.saturating_mul(1000),
        )?;
        validate_navigation_timeout(
            "search.selector_timeout_secs",
            self.search.selector_timeout_secs.saturating_mul(1000),
        )?;
        validate_probe_timeout("validator.timeout_secs", self.validator.timeout_secs.saturating_mul(1000))?;
        validate_navigation_timeout("model.timeout_secs", self.model.timeout_secs.saturating_mul(1000))?;
        if self.search.limit == 0 {
            return Err(ConfigError::Invalid("search.limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");

    if config_path.exists() {
        load_config_from(&config_path)
    } else {
        Ok(Config::default())
    }
}

/// Load and validate config from an explicit YAML file
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

use utils::{validate_navigation_timeout, validate_probe_timeout};

pub use browser::{BrowserError, BrowserResult, BrowserSession};
pub use browser_setup::{download_managed_browser, find_browser_executable};
pub use info::{
    CancellationInfo, Info, InfoParseError, InfoRequest, Mode, RegistrationInfo, RequiredInfo,
    Step,
};
pub use model::{GeminiClient, GenerateRequest, GenerativeModel, ModelError};
pub use resolver::InfoResolver;
pub use store::{InfoStore, MemoryInfoStore, PostgrestInfoStore, StoreError};
pub use utils::ConfigError;
pub use validator::{Prober, ReqwestProber, UrlValidator};
pub use web_search::{BrowserSearch, SearchProvider, SearchResult};
