use super::*;
use serde_json::json;

async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memory_storage().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("gateway.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn get_of_unknown_path_is_none() {
    let storage = memory_storage().await;
    let value = SyncGateway::get(&storage, "nobody-here")
        .await
        .expect("get");
    assert!(value.is_none());
}

#[tokio::test]
async fn put_replaces_document() {
    let storage = memory_storage().await;
    storage
        .put("a-b-com", json!({ "first_name": "A", "last_name": "B" }))
        .await
        .expect("first put");
    storage
        .put("a-b-com", json!({ "first_name": "C", "last_name": "D" }))
        .await
        .expect("second put");
    let value = SyncGateway::get(&storage, "a-b-com")
        .await
        .expect("get")
        .expect("document");
    assert_eq!(value["first_name"], "C");
}

#[tokio::test]
async fn appended_entries_read_back_in_order() {
    let storage = memory_storage().await;
    for n in 0..3 {
        storage
            .append("users", json!({ "name": format!("user {n}") }))
            .await
            .expect("append");
    }
    let value = SyncGateway::get(&storage, "users")
        .await
        .expect("get")
        .expect("list");
    let names: Vec<_> = value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v["name"].as_str().expect("name").to_string())
        .collect();
    assert_eq!(names, vec!["user 0", "user 1", "user 2"]);
}

#[tokio::test]
async fn concurrent_appends_do_not_lose_updates() {
    let storage = memory_storage().await;
    let mut tasks = Vec::new();
    for n in 0..16 {
        let storage = storage.clone();
        tasks.push(tokio::spawn(async move {
            storage
                .append("users", json!({ "name": format!("user {n}") }))
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("append");
    }
    let entries = storage.list_entries("users").await.expect("entries");
    assert_eq!(entries.len(), 16);
}

#[tokio::test]
async fn append_adopts_array_document_written_with_put() {
    let storage = memory_storage().await;
    storage
        .put("users", json!([{ "name": "legacy" }]))
        .await
        .expect("put");
    storage
        .append("users", json!({ "name": "fresh" }))
        .await
        .expect("append");
    let entries = storage.list_entries("users").await.expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "legacy");
    assert!(storage.get_document("users").await.expect("doc").is_none());
}

#[tokio::test]
async fn append_to_object_document_fails() {
    let storage = memory_storage().await;
    storage
        .put("a-b-com", json!({ "first_name": "A" }))
        .await
        .expect("put");
    let err = storage
        .append("a-b-com", json!("x"))
        .await
        .expect_err("not a list");
    assert!(matches!(err, GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn uploaded_blob_resolves_download_url() {
    let storage = memory_storage()
        .await
        .with_blob_base_url("https://cdn.example.test/");
    let url = storage
        .upload_blob("images/a-b-com_profile_picture.png", vec![1, 2, 3])
        .await
        .expect("upload");
    assert_eq!(
        url,
        "https://cdn.example.test/images/a-b-com_profile_picture.png"
    );
    assert_eq!(
        storage
            .download_url("images/a-b-com_profile_picture.png")
            .await
            .expect("url"),
        url
    );
    assert_eq!(
        storage
            .get_blob("images/a-b-com_profile_picture.png")
            .await
            .expect("blob"),
        Some(vec![1, 2, 3])
    );
}

#[tokio::test]
async fn download_url_for_missing_blob_is_unavailable() {
    let storage = memory_storage().await;
    let err = storage
        .download_url("message_images/missing.png")
        .await
        .expect_err("missing");
    assert_eq!(
        err,
        GatewayError::DownloadUrlUnavailable("message_images/missing.png".into())
    );
}

#[tokio::test]
async fn empty_blob_upload_is_rejected() {
    let storage = memory_storage().await;
    let err = storage
        .upload_blob("message_images/empty.png", Vec::new())
        .await
        .expect_err("empty");
    assert!(matches!(err, GatewayError::UploadRejected { .. }));
}

#[test]
fn memory_urls_have_no_parent_dir() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/gateway.db"),
        Some(PathBuf::from("./data/gateway.db"))
    );
}
