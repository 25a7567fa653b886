#![cfg(feature = "storage-local")]

#[path = "helpers/mod.rs"]
mod helpers;

use bucketkit_storage::{ObjectUpload, StorageError, DEFAULT_CONTENT_TYPE};
use futures::future::join_all;
use helpers::{setup_test_store, setup_test_store_with, upload_of, TEST_BUCKET};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::StatusCode;

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let store = setup_test_store().await;
    let data = b"\x89PNG\r\n\x1a\n not really an image";

    store
        .manager
        .upload("images/logo.png", upload_of(data, Some("image/png")), TEST_BUCKET, false)
        .await
        .unwrap();

    let object = store
        .manager
        .download("images/logo.png", TEST_BUCKET)
        .await
        .unwrap();

    assert_eq!(object.bucket, TEST_BUCKET);
    assert_eq!(object.key, "images/logo.png");
    assert_eq!(object.content_type.as_deref(), Some("image/png"));
    assert_eq!(object.content_length, Some(data.len() as u64));
    assert_eq!(object.into_bytes().await.unwrap().as_ref(), &data[..]);
}

#[tokio::test]
async fn test_upload_overwrites_existing_object() {
    let store = setup_test_store().await;

    store
        .manager
        .upload("notes.txt", upload_of(b"first", Some("text/plain")), TEST_BUCKET, false)
        .await
        .unwrap();
    store
        .manager
        .upload("notes.txt", upload_of(b"second version", Some("text/markdown")), TEST_BUCKET, false)
        .await
        .unwrap();

    let object = store.manager.download("notes.txt", TEST_BUCKET).await.unwrap();
    assert_eq!(object.content_type.as_deref(), Some("text/markdown"));
    assert_eq!(object.into_bytes().await.unwrap().as_ref(), b"second version");
}

#[tokio::test]
async fn test_public_flag_controls_anonymous_access() {
    let store = setup_test_store().await;

    store
        .manager
        .upload("public.txt", upload_of(b"hello", None), TEST_BUCKET, true)
        .await
        .unwrap();
    store
        .manager
        .upload("private.txt", upload_of(b"hello", None), TEST_BUCKET, false)
        .await
        .unwrap();

    assert!(store.manager.is_public_read("public.txt", TEST_BUCKET).await.unwrap());
    assert!(!store.manager.is_public_read("private.txt", TEST_BUCKET).await.unwrap());
}

#[tokio::test]
async fn test_delete_nonexistent_key_succeeds() {
    let store = setup_test_store().await;

    let result = store.manager.delete("never/uploaded.bin", TEST_BUCKET).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_delete_then_download_is_not_found() {
    let store = setup_test_store().await;

    store
        .manager
        .upload("temp.bin", upload_of(b"data", None), TEST_BUCKET, false)
        .await
        .unwrap();
    store.manager.delete("temp.bin", TEST_BUCKET).await.unwrap();

    let result = store.manager.download("temp.bin", TEST_BUCKET).await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_download_nonexistent_key_is_not_found() {
    let store = setup_test_store().await;

    let result = store.manager.download("missing.txt", TEST_BUCKET).await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_download_as_local_file_writes_key_named_file() {
    let store = setup_test_store().await;
    let data = b"quarterly numbers";

    store
        .manager
        .upload("reports/q1.csv", upload_of(data, Some("text/csv")), TEST_BUCKET, false)
        .await
        .unwrap();

    let path = store.manager.download_as_local_file("reports/q1.csv").await.unwrap();

    assert_eq!(path, store.download_dir.path().join("reports/q1.csv"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), data);
}

#[tokio::test]
async fn test_download_as_local_file_missing_key_creates_nothing() {
    let store = setup_test_store().await;

    let result = store.manager.download_as_local_file("missing.csv").await;

    assert!(matches!(result, Err(StorageError::NotFound(_))));
    assert!(!store.download_dir.path().join("missing.csv").exists());
}

#[tokio::test]
async fn test_download_as_local_file_rejects_traversal() {
    let store = setup_test_store().await;

    let result = store.manager.download_as_local_file("../escape.txt").await;
    assert!(matches!(result, Err(StorageError::InvalidKey(_))));
}

#[tokio::test]
async fn test_download_as_response_uses_stored_content_type() {
    let store = setup_test_store().await;
    let data = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>";

    store
        .manager
        .upload("icons/dot.svg", upload_of(data, Some("image/svg+xml")), TEST_BUCKET, true)
        .await
        .unwrap();

    let response = store.manager.download_as_response("icons/dot.svg").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/svg+xml");
    assert_eq!(
        response.headers()[CONTENT_LENGTH],
        data.len().to_string().as_str()
    );
    assert_eq!(response.body().as_ref(), &data[..]);
}

#[tokio::test]
async fn test_download_as_response_defaults_missing_content_type() {
    let store = setup_test_store().await;

    store
        .manager
        .upload("blob", upload_of(b"\x00\x01\x02", None), TEST_BUCKET, false)
        .await
        .unwrap();

    let response = store.manager.download_as_response("blob").await.unwrap();
    assert_eq!(response.headers()[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
}

#[tokio::test]
async fn test_download_as_response_enforces_limit() {
    let store = setup_test_store_with(|config| config.with_max_response_bytes(4)).await;

    store
        .manager
        .upload("big.txt", upload_of(b"more than four bytes", None), TEST_BUCKET, false)
        .await
        .unwrap();
    store
        .manager
        .upload("tiny.txt", upload_of(b"ok", None), TEST_BUCKET, false)
        .await
        .unwrap();

    let result = store.manager.download_as_response("big.txt").await;
    assert!(matches!(result, Err(StorageError::ResponseTooLarge { .. })));
    assert!(store.manager.download_as_response("tiny.txt").await.is_ok());
}

#[tokio::test]
async fn test_prefix_key_is_independent_object() {
    let store = setup_test_store().await;

    store
        .manager
        .upload("a/b", upload_of(b"child", None), TEST_BUCKET, false)
        .await
        .unwrap();

    assert!(matches!(
        store.manager.download("a", TEST_BUCKET).await,
        Err(StorageError::NotFound(_))
    ));
    store.manager.delete("a", TEST_BUCKET).await.unwrap();

    store
        .manager
        .upload("a", upload_of(b"parent", None), TEST_BUCKET, false)
        .await
        .unwrap();

    let parent = store.manager.download("a", TEST_BUCKET).await.unwrap();
    assert_eq!(parent.into_bytes().await.unwrap().as_ref(), b"parent");
    let child = store.manager.download("a/b", TEST_BUCKET).await.unwrap();
    assert_eq!(child.into_bytes().await.unwrap().as_ref(), b"child");
}

#[tokio::test]
async fn test_upload_from_file() {
    let store = setup_test_store().await;
    let source = store.download_dir.path().join("source.txt");
    tokio::fs::write(&source, b"from disk").await.unwrap();

    let upload = ObjectUpload::from_file(&source, Some("text/plain".to_string()))
        .await
        .unwrap();
    assert_eq!(upload.content_length, 9);

    store
        .manager
        .upload("copied.txt", upload, TEST_BUCKET, false)
        .await
        .unwrap();

    let object = store.manager.download("copied.txt", TEST_BUCKET).await.unwrap();
    assert_eq!(object.into_bytes().await.unwrap().as_ref(), b"from disk");
}

#[tokio::test]
async fn test_concurrent_uploads_do_not_interfere() {
    let store = setup_test_store().await;
    let num_objects = 16;

    let uploads = (0..num_objects).map(|i| {
        let manager = store.manager.clone();
        tokio::spawn(async move {
            let key = format!("batch/object-{}.txt", i);
            let body = format!("payload number {}", i).repeat(i + 1);
            let content_type = if i % 2 == 0 { "text/plain" } else { "text/csv" };
            manager
                .upload(&key, upload_of(body.as_bytes(), Some(content_type)), TEST_BUCKET, i % 3 == 0)
                .await
                .map(|_| (key, body, content_type, i % 3 == 0))
        })
    });

    let results = join_all(uploads).await;
    assert_eq!(results.len(), num_objects);

    for result in results {
        let (key, body, content_type, public) = result.unwrap().unwrap();
        let object = store.manager.download(&key, TEST_BUCKET).await.unwrap();
        assert_eq!(object.content_type.as_deref(), Some(content_type));
        assert_eq!(object.into_bytes().await.unwrap().as_ref(), body.as_bytes());
        assert_eq!(
            store.manager.is_public_read(&key, TEST_BUCKET).await.unwrap(),
            public
        );
    }
}
