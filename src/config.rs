//! Configuration management for the file store server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::store::DEFAULT_MAX_CHUNKS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix for file routes, without slashes
    pub route: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Form field carrying the chunk index
    pub chunk_number_field: String,
    /// Form field carrying the declared total size
    pub total_size_field: String,
    /// When set, whole-file uploads are spooled here and stored by path
    pub upload_dir: Option<PathBuf>,
    pub max_chunks: u64,
    /// Request body limit for uploads
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub use_token: bool,
    pub token_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                route: "files".to_string(),
            },
            upload: UploadConfig {
                chunk_number_field: "chunknumber".to_string(),
                total_size_field: "totalsize".to_string(),
                upload_dir: None,
                max_chunks: DEFAULT_MAX_CHUNKS,
                max_body_bytes: 1024 * 1024 * 1024,
            },
            auth: AuthConfig {
                use_token: false,
                token_ttl_secs: 3600,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let port = match env::var("SERVER_PORT").or_else(|_| env::var("PORT")) {
            Ok(value) => parse_var("SERVER_PORT", &value)?,
            Err(_) => defaults.server.port,
        };

        let max_chunks = match env::var("MAX_CHUNKS") {
            Ok(value) => parse_var("MAX_CHUNKS", &value)?,
            Err(_) => defaults.upload.max_chunks,
        };

        let max_body_bytes = match env::var("MAX_BODY_BYTES") {
            Ok(value) => parse_var("MAX_BODY_BYTES", &value)?,
            Err(_) => defaults.upload.max_body_bytes,
        };

        let token_ttl_secs = match env::var("TOKEN_TTL_SECS") {
            Ok(value) => parse_var("TOKEN_TTL_SECS", &value)?,
            Err(_) => defaults.auth.token_ttl_secs,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port,
                route: env::var("FILES_ROUTE")
                    .map(|route| normalize_route(&route))
                    .unwrap_or(defaults.server.route),
            },
            upload: UploadConfig {
                chunk_number_field: env::var("CHUNK_NUMBER_FIELD")
                    .unwrap_or(defaults.upload.chunk_number_field),
                total_size_field: env::var("TOTAL_SIZE_FIELD")
                    .unwrap_or(defaults.upload.total_size_field),
                upload_dir: env::var("UPLOAD_DIR").ok().map(PathBuf::from),
                max_chunks,
                max_body_bytes,
            },
            auth: AuthConfig {
                use_token: env::var("USE_TOKEN")
                    .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
                token_ttl_secs,
            },
        })
    }
}

/// Strip surrounding slashes so `/files/` and `files` mount the same routes
pub fn normalize_route(route: &str) -> String {
    route.trim_matches('/').to_string()
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}
