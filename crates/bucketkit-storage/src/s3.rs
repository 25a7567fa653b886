use crate::traits::{
    ObjectClient, PutBody, PutRequest, StorageError, StorageResult, StoredObject,
};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Grant, ObjectCannedAcl, Permission};
use aws_sdk_s3::Client;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

/// Group URI that S3 uses for anonymous access grants.
const ALL_USERS_GROUP: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// S3 object client
///
/// Thin wrapper over a shared [`aws_sdk_s3::Client`]. The SDK client is cheap to
/// clone and safe to use from many tasks at once; signing, retries and connection
/// pooling are left to the SDK.
#[derive(Clone, Debug)]
pub struct S3ObjectClient {
    client: Client,
}

impl S3ObjectClient {
    pub fn new(client: Client) -> Self {
        S3ObjectClient { client }
    }

    /// The underlying SDK client.
    pub fn sdk_client(&self) -> &Client {
        &self.client
    }
}

fn grants_public_read(grant: &Grant) -> bool {
    let anonymous = grant
        .grantee()
        .and_then(|grantee| grantee.uri())
        .is_some_and(|uri| uri == ALL_USERS_GROUP);
    let readable = matches!(
        grant.permission(),
        Some(Permission::Read) | Some(Permission::FullControl)
    );
    anonymous && readable
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn put_object(&self, request: PutRequest) -> StorageResult<()> {
        let PutRequest {
            bucket,
            key,
            body,
            content_length: size,
            content_type,
            public_read,
        } = request;
        let start = std::time::Instant::now();

        let body = match body {
            PutBody::Bytes(bytes) => ByteStream::from(bytes),
            PutBody::File(path) => ByteStream::from_path(&path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        let mut put = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .content_length(size as i64)
            .body(body);

        if let Some(content_type) = content_type {
            put = put.content_type(content_type);
        }
        if public_read {
            put = put.acl(ObjectCannedAcl::PublicRead);
        }

        put.send().await.map_err(|e| {
            let message = DisplayErrorContext(&e).to_string();
            tracing::error!(
                error = %message,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(message)
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            public_read,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let start = std::time::Instant::now();

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return StorageError::NotFound(format!("{}/{}", bucket, key));
                }
                let message = DisplayErrorContext(&service_error).to_string();
                tracing::error!(
                    error = %message,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(message)
            })?;

        let content_type = output.content_type().map(String::from);
        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = ?content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download started"
        );

        let stream_bucket = bucket.to_string();
        let stream_key = key.to_string();
        let body = ReaderStream::new(output.body.into_async_read()).map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %stream_bucket,
                    key = %stream_key,
                    "S3 stream download error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type,
            content_length,
            body: Box::pin(body),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                tracing::error!(
                    error = %message,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(message)
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn is_public_read(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let output = self
            .client
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return StorageError::NotFound(format!("{}/{}", bucket, key));
                }
                StorageError::BackendError(DisplayErrorContext(&service_error).to_string())
            })?;

        Ok(output.grants().iter().any(grants_public_read))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
