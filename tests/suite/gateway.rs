//! Wire contract of `HttpGateway` as seen from outside the crate.

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use wrangle_gateway::{ErrorKind, Gateway, UploadFile};

use crate::common::{
    calls_911, drop_lng, gateway_for, mount_data, mount_error, mount_suggestions,
    mount_upload_ok, split_title, start_backend, write_911_csv,
};

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let server = start_backend().await;
    mount_upload_ok(&server).await;
    let dir = tempdir().unwrap();
    let file = UploadFile::read(&write_911_csv(dir.path())).await.unwrap();

    let receipt = gateway_for(&server).upload_file(file).await.unwrap();
    assert_eq!(receipt.message.as_deref(), Some("File uploaded successfully"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""), "{body}");
    assert!(body.contains("filename=\"911.csv\""), "{body}");
    assert!(body.contains("EMS: BACK PAINS/INJURY"));
}

#[tokio::test]
async fn suggestions_keep_backend_order() {
    let server = start_backend().await;
    mount_suggestions(&server, vec![drop_lng(), split_title()]).await;

    let suggestions = gateway_for(&server).fetch_suggestions().await.unwrap();
    let titles: Vec<&str> = suggestions.iter().map(|s| s.title()).collect();
    assert_eq!(
        titles,
        ["Drop column lng", "Split title using delimiter colon (:)"]
    );
    // The payload is carried untouched for the apply call.
    assert_eq!(suggestions[1].payload(), &split_title());
}

#[tokio::test]
async fn data_keeps_declared_column_order() {
    let server = start_backend().await;
    mount_data(&server, calls_911()).await;

    let dataset = gateway_for(&server).fetch_data().await.unwrap();
    assert_eq!(dataset.columns(), ["lat", "lng", "zip", "title", "twp"]);
    assert_eq!(dataset.cell(0, "twp").display(), "NEW HANOVER");
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let server = start_backend().await;
    mount_error(&server, "POST", "/api/upload", 400, "Invalid file format").await;
    mount_error(&server, "GET", "/api/data", 404, "No data uploaded").await;
    mount_error(&server, "GET", "/api/suggestions", 503, "model warming up").await;
    mount_error(
        &server,
        "POST",
        "/api/apply-transformation",
        400,
        "column 'title' not found",
    )
    .await;
    let gateway = gateway_for(&server);

    let file = UploadFile::new("911.csv", b"zip\n19525\n".to_vec()).unwrap();
    let err = gateway.upload_file(file).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "Invalid file format");

    let err = gateway.fetch_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = gateway.fetch_suggestions().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("model warming up"), "{err}");

    let suggestion = wrangle_types::Suggestion::from_payload(split_title()).unwrap();
    let err = gateway.apply_transformation(&suggestion).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transformation);
    assert_eq!(err.to_string(), "column 'title' not found");
}

#[tokio::test]
async fn upload_reporting_failure_in_body_is_validation_error() {
    let server = start_backend().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "File is empty"})),
        )
        .mount(&server)
        .await;

    let file = UploadFile::new("empty.csv", b"x".to_vec()).unwrap();
    let err = gateway_for(&server).upload_file(file).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "File is empty");
}
