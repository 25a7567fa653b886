//! Storage manager
//!
//! The manager is the entry point callers use. Each operation builds a single
//! request, hands it to the injected [`ObjectClient`] and returns the result;
//! nothing is cached between calls.

use crate::keys::{key_to_relative_path, validate_key};
use crate::traits::{
    ObjectClient, ObjectStream, ObjectUpload, PutBody, PutRequest, StorageError, StorageResult,
    StoredObject, UploadBody, MAX_PREALLOCATION,
};
use bucketkit_core::StorageConfig;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Content type served when an object has none stored.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub struct StorageManager {
    client: Arc<dyn ObjectClient>,
    default_bucket: String,
    download_dir: PathBuf,
    max_response_bytes: Option<u64>,
}

impl StorageManager {
    /// Create a manager around `client`. Operations that do not take a bucket
    /// use `default_bucket`; local downloads land in the current directory.
    pub fn new(client: Arc<dyn ObjectClient>, default_bucket: impl Into<String>) -> Self {
        StorageManager {
            client,
            default_bucket: default_bucket.into(),
            download_dir: PathBuf::from("."),
            max_response_bytes: None,
        }
    }

    pub fn from_config(client: Arc<dyn ObjectClient>, config: &StorageConfig) -> Self {
        Self::new(client, config.bucket.clone())
            .with_download_dir(config.download_dir.clone())
            .with_max_response_bytes(config.max_response_bytes)
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_max_response_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    /// Upload `upload` to `bucket`/`key`, creating or overwriting the object.
    ///
    /// Reader bodies are read to the end into memory first; read failures and
    /// streams whose length differs from the declared one fail before anything
    /// is sent. File bodies (see [`ObjectUpload::from_file`]) are checked against
    /// the file size and passed to the client by path, so large files are never
    /// buffered. With `is_public` the object is created with the `public-read`
    /// canned ACL.
    pub async fn upload(
        &self,
        key: &str,
        upload: ObjectUpload,
        bucket: &str,
        is_public: bool,
    ) -> StorageResult<()> {
        validate_key(key)?;

        let ObjectUpload {
            body,
            content_type,
            content_length,
        } = upload;

        let body = match body {
            UploadBody::Reader(mut reader) => {
                let mut buffer =
                    Vec::with_capacity(content_length.min(MAX_PREALLOCATION) as usize);
                reader.read_to_end(&mut buffer).await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %key,
                        "Failed to read upload stream"
                    );
                    StorageError::UploadFailed(format!(
                        "Failed to read upload stream for {}: {}",
                        key, e
                    ))
                })?;
                check_length(key, buffer.len() as u64, content_length)?;
                PutBody::Bytes(Bytes::from(buffer))
            }
            UploadBody::File(path) => {
                let metadata = fs::metadata(&path).await.map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to open file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                check_length(key, metadata.len(), content_length)?;
                PutBody::File(path)
            }
        };

        let request = PutRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_length,
            content_type: content_type
                .map(|ct| ct.trim().to_string())
                .filter(|ct| !ct.is_empty()),
            public_read: is_public,
        };

        self.client.put_object(request).await
    }

    /// Fetch `bucket`/`key`. The body is streamed, not buffered.
    pub async fn download(&self, key: &str, bucket: &str) -> StorageResult<StoredObject> {
        validate_key(key)?;
        self.client.get_object(bucket, key).await
    }

    /// Delete `bucket`/`key`. Missing keys are not an error.
    pub async fn delete(&self, key: &str, bucket: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.client.delete_object(bucket, key).await
    }

    /// Whether `bucket`/`key` is readable by anonymous clients.
    pub async fn is_public_read(&self, key: &str, bucket: &str) -> StorageResult<bool> {
        validate_key(key)?;
        self.client.is_public_read(bucket, key).await
    }

    /// Download `key` from the default bucket into a file named after the key
    /// under the download directory and return its path.
    ///
    /// On any failure during the copy the partial file is removed.
    pub async fn download_as_local_file(&self, key: &str) -> StorageResult<PathBuf> {
        let path = self.download_dir.join(key_to_relative_path(key)?);
        let object = self.download(key, &self.default_bucket).await?;
        let expected = object.content_length;
        let start = std::time::Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let copied = copy_to_file(object.body, &mut file, &path).await.and_then(|written| {
            match expected {
                Some(expected) if expected != written => Err(StorageError::DownloadFailed(
                    format!("Received {} of {} bytes for {}", written, expected, key),
                )),
                _ => Ok(written),
            }
        });
        drop(file);

        let written = match copied {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    "Download to local file failed"
                );
                if let Err(remove_err) = fs::remove_file(&path).await {
                    tracing::warn!(
                        error = %remove_err,
                        path = %path.display(),
                        "Failed to remove partial download"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            bucket = %self.default_bucket,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Downloaded object to local file"
        );

        Ok(path)
    }

    /// Download `key` from the default bucket as an HTTP response whose
    /// `Content-Type` is the stored content type.
    ///
    /// The whole object is buffered in memory, so this is only suitable for
    /// small objects; set a response limit to reject anything larger.
    pub async fn download_as_response(&self, key: &str) -> StorageResult<Response<Bytes>> {
        let object = self.download(key, &self.default_bucket).await?;

        if let (Some(limit), Some(size)) = (self.max_response_bytes, object.content_length) {
            if size > limit {
                return Err(StorageError::ResponseTooLarge {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }

        let content_type = response_content_type(object.content_type.as_deref(), key);
        let body = read_limited(object.body, key, self.max_response_bytes).await?;

        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .map_err(|e| StorageError::BackendError(format!("Failed to build response: {}", e)))
    }
}

fn check_length(key: &str, actual: u64, declared: u64) -> StorageResult<()> {
    if actual != declared {
        return Err(StorageError::UploadFailed(format!(
            "Upload stream for {} yielded {} bytes, expected {}",
            key, actual, declared
        )));
    }
    Ok(())
}

async fn copy_to_file(
    mut body: ObjectStream,
    file: &mut fs::File,
    path: &Path,
) -> StorageResult<u64> {
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await.map_err(|e| {
        StorageError::DownloadFailed(format!("Failed to sync file {}: {}", path.display(), e))
    })?;

    Ok(written)
}

async fn read_limited(mut body: ObjectStream, key: &str, limit: Option<u64>) -> StorageResult<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
        if let Some(limit) = limit {
            if buffer.len() as u64 > limit {
                return Err(StorageError::ResponseTooLarge {
                    key: key.to_string(),
                    size: buffer.len() as u64,
                    limit,
                });
            }
        }
    }
    Ok(buffer.freeze())
}

/// Stored content type as a header value, or the default when it is absent or
/// not a `type/subtype` media type.
fn response_content_type(stored: Option<&str>, key: &str) -> HeaderValue {
    let Some(stored) = stored else {
        return HeaderValue::from_static(DEFAULT_CONTENT_TYPE);
    };

    let is_media_type = stored
        .split(';')
        .next()
        .is_some_and(|essence| {
            let mut parts = essence.trim().splitn(2, '/');
            matches!(
                (parts.next(), parts.next()),
                (Some(kind), Some(subtype)) if !kind.is_empty() && !subtype.is_empty()
            )
        });

    match HeaderValue::from_str(stored) {
        Ok(value) if is_media_type => value,
        _ => {
            tracing::warn!(
                key = %key,
                content_type = %stored,
                "Stored content type is not a valid media type, using default"
            );
            HeaderValue::from_static(DEFAULT_CONTENT_TYPE)
        }
    }
}
