use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the SpaceBio engine.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Postgres connection string for the rich document store.
    pub database_url: String,
    /// Base URL of the Qdrant instance that stores summary embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for summaries.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: Provider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of stored vectors; every embedding is normalized to it.
    pub embedding_dimension: usize,
    /// Chat provider used for summarization (defaults to the embedding provider).
    pub chat_provider: Provider,
    /// Chat model identifier used for summarization.
    pub chat_model: String,
    /// Optional override for the local Ollama runtime URL.
    pub ollama_url: Option<String>,
    /// API key for hosted OpenAI endpoints, required when a provider is `openai`.
    pub openai_api_key: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Result count applied when a search request omits `topk`.
    pub search_default_topk: i64,
}

/// Supported embedding and summarization backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI APIs.
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider: Provider = load_env("EMBEDDING_PROVIDER")?
            .parse()
            .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?;
        let chat_provider = match load_env_optional("CHAT_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("CHAT_PROVIDER".to_string()))?,
            None => embedding_provider,
        };

        let config = Self {
            database_url: load_env("DATABASE_URL")?,
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            chat_provider,
            chat_model: load_env("CHAT_MODEL")?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            search_default_topk: load_env_optional("DEFAULT_TOPK")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("DEFAULT_TOPK".into()))
                })
                .transpose()?
                .unwrap_or(10),
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        if (config.embedding_provider == Provider::OpenAI
            || config.chat_provider == Provider::OpenAI)
            && config.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }

        Ok(config)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl std::str::FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        chat_provider = ?config.chat_provider,
        dimension = config.embedding_dimension,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
