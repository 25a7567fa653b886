#![allow(dead_code)]

use bucketkit_core::StorageConfig;
use bucketkit_storage::{create_client, ObjectUpload, StorageManager};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_BUCKET: &str = "test-bucket";

/// Test storage state
pub struct TestStore {
    pub manager: Arc<StorageManager>,
    pub config: StorageConfig,
    pub _store_dir: TempDir,
    pub download_dir: TempDir,
}

/// Setup a manager backed by an isolated local store
pub async fn setup_test_store() -> TestStore {
    setup_test_store_with(|config| config).await
}

/// Same as [`setup_test_store`], letting the caller adjust the configuration first
pub async fn setup_test_store_with(
    adjust: impl FnOnce(StorageConfig) -> StorageConfig,
) -> TestStore {
    let store_dir = tempfile::tempdir().expect("Failed to create store dir");
    let download_dir = tempfile::tempdir().expect("Failed to create download dir");

    let config = adjust(
        StorageConfig::local(TEST_BUCKET, store_dir.path().to_string_lossy())
            .with_download_dir(download_dir.path()),
    );
    config.validate().expect("Invalid test config");

    let client = create_client(&config)
        .await
        .expect("Failed to create local client");
    let manager = Arc::new(StorageManager::from_config(client, &config));

    TestStore {
        manager,
        config,
        _store_dir: store_dir,
        download_dir,
    }
}

/// In-memory upload with the given content type
pub fn upload_of(data: &[u8], content_type: Option<&str>) -> ObjectUpload {
    ObjectUpload::from_bytes(data.to_vec(), content_type)
}
