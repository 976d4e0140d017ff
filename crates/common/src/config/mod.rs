//! Configuration management for Lectern services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Upload storage and index persistence
    pub storage: StorageConfig,

    /// Local retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Academic paper search configuration
    pub academic: AcademicConfig,

    /// Answer generation configuration
    pub answer: AnswerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written into
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Optional path the index snapshot is persisted to
    pub index_snapshot: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Results returned per document search
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcademicConfig {
    /// arXiv query endpoint
    #[serde(default = "default_arxiv_base_url")]
    pub arxiv_base_url: String,

    /// NCBI E-utilities endpoint
    #[serde(default = "default_pubmed_base_url")]
    pub pubmed_base_url: String,

    /// Contact email sent to NCBI (required by their usage policy)
    #[serde(default = "default_contact_email")]
    pub email: String,

    /// Tool name sent to NCBI
    #[serde(default = "default_tool_name")]
    pub tool: String,

    /// Maximum results requested per provider
    #[serde(default = "default_max_paper_results")]
    pub max_results: usize,

    /// Request timeout in seconds
    #[serde(default = "default_academic_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_answer_api_url")]
    pub api_url: String,

    /// API key for the answer provider
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_answer_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Nucleus sampling parameter
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Request timeout in seconds
    #[serde(default = "default_answer_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries after a retryable failure
    #[serde(default = "default_answer_retries")]
    pub max_retries: u32,

    /// First rate-limit backoff in seconds (doubles per attempt)
    #[serde(default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,

    /// Fixed delay between transport-failure retries, in seconds
    #[serde(default = "default_transport_retry_delay")]
    pub transport_retry_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_top_k() -> usize { 5 }
fn default_arxiv_base_url() -> String { "http://export.arxiv.org/api/query".to_string() }
fn default_pubmed_base_url() -> String { "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string() }
fn default_contact_email() -> String { "user@example.com".to_string() }
fn default_tool_name() -> String { "lectern".to_string() }
fn default_max_paper_results() -> usize { 3 }
fn default_academic_timeout() -> u64 { 10 }
fn default_answer_api_url() -> String { "https://api.groq.com/openai/v1/chat/completions".to_string() }
fn default_answer_model() -> String { "llama3-70b-8192".to_string() }
fn default_temperature() -> f64 { 0.2 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f64 { 0.95 }
fn default_answer_timeout() -> u64 { 30 }
fn default_answer_retries() -> u32 { 3 }
fn default_rate_limit_backoff() -> u64 { 2 }
fn default_transport_retry_delay() -> u64 { 1 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "lectern".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8001
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            api_url: default_answer_api_url(),
            api_key: None,
            model: default_answer_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_answer_timeout(),
            max_retries: default_answer_retries(),
            rate_limit_backoff_secs: default_rate_limit_backoff(),
            transport_retry_delay_secs: default_transport_retry_delay(),
        }
    }
}

impl Default for AcademicConfig {
    fn default() -> Self {
        Self {
            arxiv_base_url: default_arxiv_base_url(),
            pubmed_base_url: default_pubmed_base_url(),
            email: default_contact_email(),
            tool: default_tool_name(),
            max_results: default_max_paper_results(),
            timeout_secs: default_academic_timeout(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            storage: StorageConfig {
                upload_dir: default_upload_dir(),
                index_snapshot: None,
            },
            retrieval: RetrievalConfig {
                top_k: default_top_k(),
            },
            academic: AcademicConfig::default(),
            answer: AnswerConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.academic.max_results, 3);
        assert_eq!(config.answer.model, "llama3-70b-8192");
    }

    #[test]
    fn test_retry_schedule_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.answer.max_retries, 3);
        assert_eq!(config.answer.rate_limit_backoff_secs, 2);
        assert_eq!(config.answer.transport_retry_delay_secs, 1);
    }
}
