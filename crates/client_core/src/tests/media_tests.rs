use super::*;

use crate::test_support::{identity, MemoryGateway};

#[tokio::test]
async fn profile_picture_lands_under_images() {
    let gateway = MemoryGateway::new();
    let media = Media::new(gateway.clone());
    let me = identity("a.b@c.com");

    let url = media
        .upload_profile_picture(&me, vec![0x89, 0x50])
        .await
        .expect("upload");
    assert_eq!(url, "memory://images/a-b-c-com_profile_picture.png");
    assert!(gateway
        .blob("images/a-b-c-com_profile_picture.png")
        .await
        .is_some());
    assert_eq!(media.profile_picture_url(&me).await.expect("url"), url);
}

#[tokio::test]
async fn message_photo_lands_under_message_images() {
    let gateway = MemoryGateway::new();
    let media = Media::new(gateway.clone());
    let name = new_photo_file_name();
    let url = media
        .upload_message_photo(&name, vec![1, 2, 3])
        .await
        .expect("upload");
    assert_eq!(url, format!("memory://message_images/{name}"));
}

#[tokio::test]
async fn photo_name_with_separator_is_rejected() {
    let media = Media::new(MemoryGateway::new());
    let err = media
        .upload_message_photo("../images/x.png", vec![1])
        .await
        .expect_err("separator");
    assert!(matches!(err, SyncError::Validation(_)));
}

#[tokio::test]
async fn rejected_upload_reports_upload_failed() {
    let gateway = MemoryGateway::new();
    gateway.fail_uploads(true);
    let media = Media::new(gateway.clone());
    let err = media
        .upload_profile_picture(&identity("a@b.com"), vec![1])
        .await
        .expect_err("rejected");
    assert!(matches!(err, SyncError::UploadFailed(_)));
}

#[tokio::test]
async fn missing_blob_has_no_download_url() {
    let media = Media::new(MemoryGateway::new());
    let err = media
        .download_url("message_images/unknown.png")
        .await
        .expect_err("missing");
    assert_eq!(
        err,
        SyncError::DownloadUrlUnavailable("message_images/unknown.png".into())
    );
}
