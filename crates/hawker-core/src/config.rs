use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HawkerError, Result};

/// Top-level configuration for the Hawker engine.
///
/// Loaded from `~/.hawker/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HawkerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub order: OrderConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for HawkerConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            llm: LlmConfig::default(),
            intent: IntentConfig::default(),
            search: SearchConfig::default(),
            web_search: WebSearchConfig::default(),
            session: SessionConfig::default(),
            order: OrderConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl HawkerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HawkerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HawkerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application and shop identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for SQLite, the product catalog, etc.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Shop display name used in replies.
    pub shop_name: String,
    /// Shop hotline shown in order confirmations.
    pub shop_phone: String,
    /// Shop contact email shown in order confirmations.
    pub shop_email: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.hawker/data".to_string(),
            log_level: "info".to_string(),
            shop_name: "HawkerPhone".to_string(),
            shop_phone: "1900 8198".to_string(),
            shop_email: "sales@hawkerphone.vn".to_string(),
        }
    }
}

/// Language model backend configuration (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat completions endpoint.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Maximum completion tokens per request.
    pub max_tokens: u32,
    /// Sampling temperature for intent analysis calls.
    pub intent_temperature: f64,
    /// Sampling temperature for customer-facing answers.
    pub answer_temperature: f64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Retries after the initial attempt on transient failure.
    pub max_retries: u32,
    /// Delay between retries in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            api_key_env: "HAWKER_LLM_API_KEY".to_string(),
            model: "grok-3-mini".to_string(),
            max_tokens: 1024,
            intent_temperature: 0.1,
            answer_temperature: 0.7,
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Intent classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Rule score at or above which a message counts as an order signal.
    pub order_threshold: u32,
    /// Half-width of the score band around the threshold where the rule
    /// engine defers to the language model.
    pub uncertainty_band: u32,
    /// Recent conversation turns considered for contextual scoring.
    pub history_turns: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            order_threshold: 40,
            uncertainty_band: 15,
            history_turns: 3,
        }
    }
}

/// Product search and evidence aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results requested from each source.
    pub top_k: usize,
    /// Internal results below this count trigger web augmentation.
    pub min_internal_results: usize,
    /// Results scoring below this relevance are dropped.
    pub min_relevance: f64,
    /// Name similarity at or above which two results are duplicates.
    pub dedup_threshold: f64,
    /// Maximum results kept per brand after deduplication.
    pub max_per_brand: usize,
    /// Embedding dimension for the product index.
    pub embedding_dim: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_internal_results: 2,
            min_relevance: 0.3,
            dedup_threshold: 0.8,
            max_per_brand: 2,
            embedding_dim: 384,
        }
    }
}

/// External web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Whether web augmentation is enabled at all.
    pub enabled: bool,
    /// Search endpoint base URL. Empty disables web search.
    pub base_url: String,
    /// Maximum web results per query (clamped to 1..=20 at the provider).
    pub max_results: usize,
    /// Region code passed to the search backend.
    pub region: String,
    /// Per-query timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            max_results: 5,
            region: "vn-vi".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Conversation session persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// SQLite database path for session records.
    pub db_path: String,
    /// Messages retained per conversation. Oldest are evicted beyond the cap.
    pub history_cap: usize,
    /// Optimistic save attempts before giving up on a conflicted session.
    pub save_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.hawker/data/sessions.db".to_string(),
            history_cap: 20,
            save_retries: 3,
        }
    }
}

/// Order flow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Turns an order may sit without advancing before it is cancelled.
    pub abandon_turn_limit: u32,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            abandon_turn_limit: 5,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = HawkerConfig::default();
        assert_eq!(config.general.data_dir, "~/.hawker/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.shop_name, "HawkerPhone");
        assert_eq!(config.llm.model, "grok-3-mini");
        assert_eq!(config.intent.order_threshold, 40);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.session.history_cap, 20);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"
shop_name = "PhoneHub"
shop_phone = "1900 1234"
shop_email = "hello@phonehub.vn"

[intent]
order_threshold = 50
uncertainty_band = 10
history_turns = 5

[server]
host = "0.0.0.0"
port = 9090
"#;
        let file = create_temp_config(content);
        let config = HawkerConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.shop_name, "PhoneHub");
        assert_eq!(config.intent.order_threshold, 50);
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = HawkerConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        // Remaining fields use defaults
        assert_eq!(config.general.data_dir, "~/.hawker/data");
        assert_eq!(config.intent.order_threshold, 40);
        assert_eq!(config.search.dedup_threshold, 0.8);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = HawkerConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.hawker/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = HawkerConfig::default();
        config.save(&path).unwrap();

        let reloaded = HawkerConfig::load(&path).unwrap();
        assert_eq!(reloaded.general.data_dir, config.general.data_dir);
        assert_eq!(reloaded.llm.model, config.llm.model);
        assert_eq!(reloaded.intent.order_threshold, config.intent.order_threshold);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = HawkerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let deserialized: HawkerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.general.log_level, config.general.log_level);
    }

    // =========================================================================
    // Additional comprehensive tests
    // =========================================================================

    #[test]
    fn test_config_load_valid_toml() {
        let content = r#"
[general]
data_dir = "/tmp/hawker-test"
log_level = "trace"
shop_name = "Mobilemart"
shop_phone = "028 7300 1866"
shop_email = "cs@mobilemart.vn"

[llm]
base_url = "https://api.example.com/v1"
api_key_env = "EXAMPLE_KEY"
model = "gpt-4o-mini"
max_tokens = 2048
intent_temperature = 0.0
answer_temperature = 0.5
request_timeout_secs = 60
max_retries = 3
retry_backoff_ms = 250

[intent]
order_threshold = 45
uncertainty_band = 20
history_turns = 4

[search]
top_k = 8
min_internal_results = 3
min_relevance = 0.25
dedup_threshold = 0.85
max_per_brand = 1
embedding_dim = 512

[web_search]
enabled = false
base_url = "https://searx.local"
max_results = 10
region = "us-en"
timeout_secs = 5

[session]
db_path = "/tmp/hawker-test/sessions.db"
history_cap = 40
save_retries = 5

[order]
abandon_turn_limit = 8

[server]
host = "0.0.0.0"
port = 3000
"#;
        let file = create_temp_config(content);
        let config = HawkerConfig::load(file.path()).unwrap();

        assert_eq!(config.general.data_dir, "/tmp/hawker-test");
        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.general.shop_name, "Mobilemart");
        assert_eq!(config.general.shop_phone, "028 7300 1866");

        assert_eq!(config.llm.base_url, "https://api.example.com/v1");
        assert_eq!(config.llm.api_key_env, "EXAMPLE_KEY");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 2048);
        assert!((config.llm.intent_temperature - 0.0).abs() < f64::EPSILON);
        assert!((config.llm.answer_temperature - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.llm.request_timeout_secs, 60);
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.llm.retry_backoff_ms, 250);

        assert_eq!(config.intent.order_threshold, 45);
        assert_eq!(config.intent.uncertainty_band, 20);
        assert_eq!(config.intent.history_turns, 4);

        assert_eq!(config.search.top_k, 8);
        assert_eq!(config.search.min_internal_results, 3);
        assert!((config.search.min_relevance - 0.25).abs() < f64::EPSILON);
        assert!((config.search.dedup_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.search.max_per_brand, 1);
        assert_eq!(config.search.embedding_dim, 512);

        assert!(!config.web_search.enabled);
        assert_eq!(config.web_search.base_url, "https://searx.local");
        assert_eq!(config.web_search.max_results, 10);
        assert_eq!(config.web_search.region, "us-en");
        assert_eq!(config.web_search.timeout_secs, 5);

        assert_eq!(config.session.db_path, "/tmp/hawker-test/sessions.db");
        assert_eq!(config.session.history_cap, 40);
        assert_eq!(config.session.save_retries, 5);

        assert_eq!(config.order.abandon_turn_limit, 8);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_default_values() {
        let config = HawkerConfig::default();

        // General
        assert_eq!(config.general.data_dir, "~/.hawker/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.shop_name, "HawkerPhone");
        assert_eq!(config.general.shop_phone, "1900 8198");
        assert_eq!(config.general.shop_email, "sales@hawkerphone.vn");

        // Llm
        assert_eq!(config.llm.base_url, "http://127.0.0.1:8000/v1");
        assert_eq!(config.llm.api_key_env, "HAWKER_LLM_API_KEY");
        assert_eq!(config.llm.model, "grok-3-mini");
        assert_eq!(config.llm.max_tokens, 1024);
        assert!((config.llm.intent_temperature - 0.1).abs() < f64::EPSILON);
        assert!((config.llm.answer_temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.llm.request_timeout_secs, 30);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.llm.retry_backoff_ms, 500);

        // Intent
        assert_eq!(config.intent.order_threshold, 40);
        assert_eq!(config.intent.uncertainty_band, 15);
        assert_eq!(config.intent.history_turns, 3);

        // Search
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.min_internal_results, 2);
        assert!((config.search.min_relevance - 0.3).abs() < f64::EPSILON);
        assert!((config.search.dedup_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.search.max_per_brand, 2);
        assert_eq!(config.search.embedding_dim, 384);

        // Web search
        assert!(config.web_search.enabled);
        assert!(config.web_search.base_url.is_empty());
        assert_eq!(config.web_search.max_results, 5);
        assert_eq!(config.web_search.region, "vn-vi");
        assert_eq!(config.web_search.timeout_secs, 10);

        // Session
        assert_eq!(config.session.db_path, "~/.hawker/data/sessions.db");
        assert_eq!(config.session.history_cap, 20);
        assert_eq!(config.session.save_retries, 3);

        // Order
        assert_eq!(config.order.abandon_turn_limit, 5);

        // Server
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let content = "this is {{ not valid TOML";
        let file = create_temp_config(content);
        let result = HawkerConfig::load(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("config.toml");

        let config = HawkerConfig::default();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = HawkerConfig::load(&path).unwrap();
        assert_eq!(reloaded.general.log_level, "info");
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let content = "";
        let file = create_temp_config(content);
        let config = HawkerConfig::load(file.path()).unwrap();

        // All defaults should apply
        assert_eq!(config.general.data_dir, "~/.hawker/data");
        assert_eq!(config.intent.order_threshold, 40);
        assert_eq!(config.session.history_cap, 20);
    }

    #[test]
    fn test_sub_config_defaults() {
        // Test each sub-config Default impl independently
        let general = GeneralConfig::default();
        assert_eq!(general.data_dir, "~/.hawker/data");
        assert_eq!(general.log_level, "info");
        assert_eq!(general.shop_name, "HawkerPhone");

        let llm = LlmConfig::default();
        assert_eq!(llm.model, "grok-3-mini");
        assert_eq!(llm.max_retries, 2);

        let intent = IntentConfig::default();
        assert_eq!(intent.order_threshold, 40);
        assert_eq!(intent.uncertainty_band, 15);

        let search = SearchConfig::default();
        assert_eq!(search.embedding_dim, 384);
        assert_eq!(search.max_per_brand, 2);

        let web = WebSearchConfig::default();
        assert!(web.enabled);
        assert_eq!(web.max_results, 5);

        let session = SessionConfig::default();
        assert_eq!(session.history_cap, 20);
        assert_eq!(session.save_retries, 3);

        let order = OrderConfig::default();
        assert_eq!(order.abandon_turn_limit, 5);

        let server = ServerConfig::default();
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 8080);
    }
}
