//! Bucketkit Storage Library
//!
//! Create, read and delete objects in a bucket through an injected
//! [`ObjectClient`]. The [`factory`] builds one long-lived client from a
//! [`bucketkit_core::StorageConfig`]; the [`StorageManager`] wraps it with the
//! upload, download, delete, download-to-file and download-as-response operations.
//!
//! # Backends
//!
//! - **S3** (`storage-s3`): AWS S3 or an S3-compatible endpoint via `aws-sdk-s3`.
//! - **Local** (`storage-local`): a directory on disk, one flat file per key
//!   under `{root}/{bucket}`.
//!
//! Keys mapped onto the filesystem must not contain `..`, backslashes or a
//! leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod manager;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use bucketkit_core::StorageBackend;
pub use factory::create_client;
#[cfg(feature = "storage-s3")]
pub use factory::{create_s3_client, SharedCredentialsProvider};
#[cfg(feature = "storage-local")]
pub use local::LocalObjectClient;
pub use manager::{StorageManager, DEFAULT_CONTENT_TYPE};
#[cfg(feature = "storage-s3")]
pub use s3::S3ObjectClient;
pub use traits::{
    ObjectClient, ObjectReader, ObjectStream, ObjectUpload, PutBody, PutRequest, StorageError,
    StorageResult, StoredObject, UploadBody,
};
