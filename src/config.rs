use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub default_language: String,
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    /// Required for the Postgres backend only.
    pub database_url: Option<String>,
    /// `None` keeps photos in process memory.
    pub storage: Option<StorageConfig>,
    pub analyzer: AnalyzerConfig,
    pub cache_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres store backend");
        }

        let storage = match std::env::var("MINIO_ENDPOINT") {
            Ok(endpoint) => Some(StorageConfig {
                endpoint,
                bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "meals".into()),
                access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY")?,
                secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY")?,
                region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            Err(_) => None,
        };

        let analyzer = AnalyzerConfig {
            url: std::env::var("ANALYZER_URL").context("ANALYZER_URL")?,
            timeout_secs: std::env::var("ANALYZER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
            default_language: std::env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".into()),
        };

        let cache_ttl_secs = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5 * 60);

        Ok(Self {
            store_backend,
            database_url,
            storage,
            analyzer,
            cache_ttl_secs,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
