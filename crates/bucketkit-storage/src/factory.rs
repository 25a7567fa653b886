#[cfg(feature = "storage-local")]
use crate::LocalObjectClient;
#[cfg(feature = "storage-s3")]
use crate::S3ObjectClient;
use crate::{ObjectClient, StorageBackend, StorageError, StorageResult};
use bucketkit_core::StorageConfig;
use std::sync::Arc;

#[cfg(feature = "storage-s3")]
pub use aws_sdk_s3::config::SharedCredentialsProvider;

/// Create the object client selected by `config.backend`.
///
/// S3 clients resolve credentials from the static keys in the configuration
/// when present, otherwise from the default AWS provider chain. Use
/// [`create_s3_client`] to inject a provider explicitly; the signature here
/// stays the same whichever backend features are compiled in.
pub async fn create_client(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectClient>> {
    match config.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let client = create_s3_client(config, None).await?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let root = config.local_storage_path.as_deref().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let client = LocalObjectClient::new(root).await?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Build one long-lived S3 client from the configured region.
///
/// Credential precedence: `credentials`, then the static keys in `config`,
/// then the default AWS chain (environment, profile, IMDS, ...).
#[cfg(feature = "storage-s3")]
pub async fn create_s3_client(
    config: &StorageConfig,
    credentials: Option<SharedCredentialsProvider>,
) -> StorageResult<S3ObjectClient> {
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::config::Region;

    let region = config
        .region
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
        })?;

    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(provider) = resolve_credentials(config, credentials) {
        loader = loader.credentials_provider(provider);
    }
    let sdk_config = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = config.endpoint.as_deref() {
        // S3-compatible providers are addressed path-style: {endpoint}/{bucket}/{key}
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    tracing::info!(
        region = %region,
        endpoint = ?config.endpoint,
        bucket = %config.bucket,
        "S3 client created"
    );

    Ok(S3ObjectClient::new(aws_sdk_s3::Client::from_conf(
        builder.build(),
    )))
}

/// Injected provider, else the static keys from `config`. `None` leaves the
/// choice to the default AWS chain.
#[cfg(feature = "storage-s3")]
fn resolve_credentials(
    config: &StorageConfig,
    injected: Option<SharedCredentialsProvider>,
) -> Option<SharedCredentialsProvider> {
    use aws_sdk_s3::config::Credentials;

    injected.or_else(|| match (&config.aws_access_key_id, &config.aws_secret_access_key) {
        (Some(access_key), Some(secret_key)) => Some(SharedCredentialsProvider::new(
            Credentials::new(access_key, secret_key, None, None, "bucketkit-config"),
        )),
        _ => None,
    })
}
