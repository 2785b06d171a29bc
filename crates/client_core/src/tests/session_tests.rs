use super::*;

#[tokio::test]
async fn set_identity_normalizes_and_exposes_key() {
    let store = SessionStore::in_memory();
    let identity = store.set_identity("a.b@c.com").await.expect("identity");
    assert_eq!(identity.as_str(), "a-b-c-com");
    assert_eq!(store.current_identity().await, Some(identity));
}

#[tokio::test]
async fn blank_identifier_is_rejected_and_leaves_store_untouched() {
    let store = SessionStore::in_memory();
    let err = store.set_identity("  \t ").await.expect_err("blank");
    assert!(matches!(err, SyncError::InvalidIdentity(_)));
    assert_eq!(store.current_identity().await, None);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let store = SessionStore::in_memory();
    store.set_identity("x@y.com").await.expect("identity");
    store.clear().await.expect("first clear");
    store.clear().await.expect("second clear");
    assert_eq!(store.current_identity().await, None);
    assert_eq!(store.require_identity().await, Err(SyncError::NotSignedIn));
}

#[tokio::test]
async fn persisted_session_is_restored_on_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let store = SessionStore::open(dir.path()).await.expect("open");
        store.set_identity("x@y.com").await.expect("identity");
    }

    let reopened = SessionStore::open(dir.path()).await.expect("reopen");
    assert_eq!(
        reopened.current_identity().await.map(|i| i.as_str().to_string()),
        Some("x-y-com".to_string())
    );
}

#[tokio::test]
async fn clear_removes_persisted_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::open(dir.path()).await.expect("open");
    store.set_identity("x@y.com").await.expect("identity");
    assert!(dir.path().join(SESSION_FILE_NAME).exists());

    store.clear().await.expect("clear");
    assert!(!dir.path().join(SESSION_FILE_NAME).exists());

    let reopened = SessionStore::open(dir.path()).await.expect("reopen");
    assert_eq!(reopened.current_identity().await, None);
}

#[tokio::test]
async fn corrupt_session_file_starts_signed_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(SESSION_FILE_NAME), b"{not json").expect("write");
    let store = SessionStore::open(dir.path()).await.expect("open");
    assert_eq!(store.current_identity().await, None);
}
