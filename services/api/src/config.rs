//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use document_insights_core::DEFAULT_ANALYSIS_LIMIT;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where uploaded blobs are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// An S3-compatible bucket.
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
    /// A directory on the local filesystem.
    Local { root: PathBuf },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub analysis_limit: u64,
    pub max_upload_bytes: usize,
    pub cors_origin: String,
    pub jwt_secret: String,
    pub storage: StorageBackend,
    pub public_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_api_base: String,
    pub llm_model: String,
    pub prompts_path: PathBuf,
    pub max_prompt_chars: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:4000")?;
        let database_url = required_var("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Upload and Quota Settings ---
        let analysis_limit = parse_var("ANALYSIS_LIMIT", &DEFAULT_ANALYSIS_LIMIT.to_string())?;
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", "10485760")?;
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let jwt_secret = required_var("JWT_SECRET")?;

        // --- Load Object Storage Settings ---
        let storage = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" => StorageBackend::S3 {
                bucket: required_var("STORAGE_BUCKET")?,
                region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: std::env::var("STORAGE_ENDPOINT").ok(),
            },
            "local" => StorageBackend::Local {
                root: std::env::var("STORAGE_LOCAL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./uploads")),
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of 's3', 'local'", other),
                ))
            }
        };
        let public_base_url = required_var("PUBLIC_BASE_URL")?;

        // --- Load Analysis Provider Settings ---
        let llm_api_key = std::env::var("LLM_API_KEY").ok();
        let llm_api_base =
            std::env::var("LLM_API_BASE").unwrap_or_else(|_| "https://api.x.ai/v1".to_string());
        let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "grok-3-latest".to_string());
        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));
        let max_prompt_chars = parse_var("MAX_PROMPT_CHARS", "60000")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            analysis_limit,
            max_upload_bytes,
            cors_origin,
            jwt_secret,
            storage,
            public_base_url,
            llm_api_key,
            llm_api_base,
            llm_model,
            prompts_path,
            max_prompt_chars,
        })
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
