//! Configuration module
//!
//! Storage settings are read from the environment (a `.env` file is honoured)
//! or built directly with [`StorageConfig::s3`] / [`StorageConfig::local`].

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const DEFAULT_DOWNLOAD_DIR: &str = ".";

/// Settings for the storage client and the storage manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Default bucket used by operations that do not name one.
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    /// Directory that `download_as_local_file` writes into.
    pub download_dir: PathBuf,
    /// Upper bound for objects buffered into an HTTP response. `None` = unbounded.
    pub max_response_bytes: Option<u64>,
}

impl StorageConfig {
    /// S3 configuration for `bucket` in `region`, other settings at their defaults.
    pub fn s3(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        StorageConfig {
            backend: StorageBackend::S3,
            bucket: bucket.into(),
            region: Some(region.into()),
            endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            local_storage_path: None,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            max_response_bytes: None,
        }
    }

    /// Local filesystem configuration rooted at `path`.
    pub fn local(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        StorageConfig {
            backend: StorageBackend::Local,
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            local_storage_path: Some(path.into()),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            max_response_bytes: None,
        }
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = Some(limit);
        self
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        let backend = match var("STORAGE_BACKEND") {
            Some(s) => s.parse::<StorageBackend>()?,
            None => StorageBackend::default(),
        };

        let max_response_bytes = match var("MAX_RESPONSE_BYTES") {
            Some(s) => Some(
                s.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("MAX_RESPONSE_BYTES must be a valid number"))?,
            ),
            None => None,
        };

        let config = StorageConfig {
            backend,
            bucket: var("S3_BUCKET").unwrap_or_default(),
            region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            endpoint: var("S3_ENDPOINT"),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            download_dir: var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            max_response_bytes,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("S3_BUCKET must be set"));
        }

        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            return Err(anyhow::anyhow!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ));
        }

        match self.backend {
            StorageBackend::S3 => {
                if self.region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
