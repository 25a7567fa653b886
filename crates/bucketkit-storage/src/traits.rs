//! Object client abstraction
//!
//! This module defines the `ObjectClient` trait that every storage backend
//! implements, together with the request and response types that flow through it.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object {key} is {size} bytes, exceeding the {limit} byte response limit")]
    ResponseTooLarge { key: String, size: u64, limit: u64 },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Upper bound on buffers preallocated from a declared object length.
pub(crate) const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Readable input for an upload.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Byte chunks of a downloaded object.
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Where the bytes of an upload come from.
pub enum UploadBody {
    Reader(ObjectReader),
    /// A file on disk. It is handed to the client as a path and never read
    /// into memory by the manager.
    File(PathBuf),
}

/// Content supplied by the caller of an upload: a byte source plus the declared
/// content type and length.
pub struct ObjectUpload {
    pub body: UploadBody,
    pub content_type: Option<String>,
    pub content_length: u64,
}

impl ObjectUpload {
    pub fn new(
        body: impl AsyncRead + Send + Unpin + 'static,
        content_type: Option<String>,
        content_length: u64,
    ) -> Self {
        ObjectUpload {
            body: UploadBody::Reader(Box::pin(body)),
            content_type,
            content_length,
        }
    }

    /// Upload an in-memory buffer.
    pub fn from_bytes(data: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        let data: Bytes = data.into();
        let len = data.len() as u64;
        Self::new(Cursor::new(data), content_type.map(String::from), len)
    }

    /// Upload the contents of a file on disk. The length is taken from the file metadata.
    pub async fn from_file(
        path: impl AsRef<Path>,
        content_type: Option<String>,
    ) -> StorageResult<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(StorageError::UploadFailed(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(ObjectUpload {
            body: UploadBody::File(path.to_path_buf()),
            content_type,
            content_length: metadata.len(),
        })
    }
}

impl fmt::Debug for ObjectUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUpload")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Payload of a [`PutRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutBody {
    Bytes(Bytes),
    /// Streamed from disk by the client.
    File(PathBuf),
}

/// A single put against the store, built by the manager from an [`ObjectUpload`].
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub bucket: String,
    pub key: String,
    pub body: PutBody,
    /// Verified length of `body`.
    pub content_length: u64,
    pub content_type: Option<String>,
    /// Attach the `public-read` canned ACL.
    pub public_read: bool,
}

/// Handle to a remote object: metadata plus a lazily consumed body.
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ObjectStream,
}

impl StoredObject {
    /// Drain the body into memory.
    pub async fn into_bytes(mut self) -> StorageResult<Bytes> {
        let capacity = self.content_length.unwrap_or(0).min(MAX_PREALLOCATION) as usize;
        let mut buffer = BytesMut::with_capacity(capacity);
        while let Some(chunk) = self.body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Object client trait
///
/// All storage backends (S3, local filesystem) implement this trait. The
/// storage manager only ever talks to a `dyn ObjectClient`, so the concrete
/// client is chosen once by the factory and injected.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Create or overwrite an object.
    async fn put_object(&self, request: PutRequest) -> StorageResult<()>;

    /// Fetch an object. Missing keys yield [`StorageError::NotFound`].
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Whether anonymous clients may read the object.
    async fn is_public_read(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
