use crate::keys::key_to_relative_path;
use crate::traits::{
    ObjectClient, PutBody, PutRequest, StorageError, StorageResult, StoredObject,
};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Directory under the root that holds metadata sidecars.
const META_DIR: &str = ".meta";

/// Longest encoded key that still fits a 255 byte file name with the sidecar suffix.
const MAX_FILE_NAME_BYTES: usize = 250;

/// Metadata kept next to every stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: Option<String>,
    content_length: u64,
    public_read: bool,
}

/// Local filesystem object client
///
/// Every object is one flat file, `{root}/{bucket}/{encoded key}`, where the
/// key is percent-encoded so `/` never creates a directory. Keys that are path
/// prefixes of each other (`a` and `a/b`) therefore live side by side. The
/// content type, length and access flag live in a JSON sidecar at
/// `{root}/.meta/{bucket}/{encoded key}.json`.
#[derive(Clone, Debug)]
pub struct LocalObjectClient {
    root: PathBuf,
}

impl LocalObjectClient {
    /// Create a new LocalObjectClient rooted at `root` (e.g. "/var/lib/bucketkit")
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalObjectClient { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_segment(bucket: &str) -> StorageResult<PathBuf> {
        if bucket == META_DIR || bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "Invalid bucket name: {}",
                bucket
            )));
        }
        key_to_relative_path(bucket)
    }

    /// Flat file name for `key`.
    fn file_name(key: &str) -> StorageResult<String> {
        // Same key rules as every other filesystem mapping in the crate
        key_to_relative_path(key)?;

        let encoded = urlencoding::encode(key).into_owned();
        if encoded.len() > MAX_FILE_NAME_BYTES {
            return Err(StorageError::InvalidKey(format!(
                "Key is too long for local storage ({} bytes encoded, max {})",
                encoded.len(),
                MAX_FILE_NAME_BYTES
            )));
        }
        Ok(encoded)
    }

    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        Ok(self
            .root
            .join(Self::bucket_segment(bucket)?)
            .join(Self::file_name(key)?))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        Ok(self
            .root
            .join(META_DIR)
            .join(Self::bucket_segment(bucket)?)
            .join(format!("{}.json", Self::file_name(key)?)))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_meta(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.meta_path(bucket, key)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| {
            StorageError::BackendError(format!(
                "Corrupt metadata {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
        Self::ensure_parent_dir(path).await?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    async fn copy_file(source: &Path, path: &Path, expected: u64) -> StorageResult<()> {
        Self::ensure_parent_dir(path).await?;

        let copied = fs::copy(source, path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;
        if copied != expected {
            return Err(StorageError::UploadFailed(format!(
                "Copied {} bytes from {}, expected {}",
                copied,
                source.display(),
                expected
            )));
        }

        let file = fs::File::open(path).await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ObjectClient for LocalObjectClient {
    async fn put_object(&self, request: PutRequest) -> StorageResult<()> {
        let path = self.object_path(&request.bucket, &request.key)?;
        let meta_path = self.meta_path(&request.bucket, &request.key)?;
        let size = request.content_length;
        let start = std::time::Instant::now();

        match &request.body {
            PutBody::Bytes(bytes) => Self::write_file(&path, bytes).await?,
            PutBody::File(source) => Self::copy_file(source, &path, size).await?,
        }

        let meta = ObjectMeta {
            content_type: request.content_type,
            content_length: size,
            public_read: request.public_read,
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;
        Self::write_file(&meta_path, &meta_json).await?;

        tracing::info!(
            path = %path.display(),
            bucket = %request.bucket,
            key = %request.key,
            size_bytes = size,
            public_read = meta.public_read,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        let meta = self.read_meta(bucket, key).await?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = meta.content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download started"
        );

        let path_display = path.display().to_string();
        let body = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    path = %path_display,
                    error = %e,
                    "Local storage stream download error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: meta.content_type,
            content_length: Some(meta.content_length),
            body: Box::pin(body),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        let start = std::time::Instant::now();

        for target in [&path, &meta_path] {
            match fs::remove_file(target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "Failed to delete file {}: {}",
                        target.display(),
                        e
                    )))
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn is_public_read(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self.read_meta(bucket, key).await?.public_read)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
