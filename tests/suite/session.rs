//! End-to-end session flows: `SessionRuntime` driving a real `HttpGateway` against a
//! mock backend.

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wrangle_engine::{
    GatewayConfig, HttpGateway, Intent, NoticeLevel, Rejected, SessionRuntime, SessionStatus,
    SuggestionId,
};

use crate::common::{
    calls_911, calls_911_split, drop_lng, mount_data, mount_error, mount_loaded_911,
    mount_suggestions, runtime_for, split_title, start_backend, write_911_csv,
};

async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn upload_911_reaches_ready() {
    let server = start_backend().await;
    mount_loaded_911(&server).await;
    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());

    runtime
        .dispatch(Intent::Upload(write_911_csv(dir.path())))
        .unwrap();
    assert_eq!(runtime.state().status(), SessionStatus::Loading);
    runtime.settle().await;

    assert_eq!(
        request_paths(&server).await,
        ["/api/upload", "/api/data", "/api/suggestions"]
    );
    let state = runtime.state();
    assert_eq!(state.status(), SessionStatus::Ready);
    let dataset = state.dataset().unwrap();
    assert_eq!(dataset.row_count(), 3);
    assert_eq!(dataset.columns(), ["lat", "lng", "zip", "title", "twp"]);
    assert!(dataset.cell(2, "zip").is_null());
    assert_eq!(state.suggestions().len(), 2);
    assert_eq!(state.label(), Some("911.csv"));
    assert_eq!(
        state.notice().unwrap().text,
        "Loaded 911.csv (3 rows, 5 columns)"
    );
}

#[tokio::test]
async fn apply_split_title_replaces_dataset_and_refetches() {
    let server = start_backend().await;
    mount_loaded_911(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/apply-transformation"))
        .and(body_json(json!({"suggestion": split_title()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(calls_911_split()))
        .expect(1)
        .mount(&server)
        .await;
    mount_suggestions(&server, vec![drop_lng()]).await;

    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime
        .dispatch(Intent::Upload(write_911_csv(dir.path())))
        .unwrap();
    runtime.settle().await;
    let loaded_version = runtime.state().version();

    runtime
        .dispatch(Intent::Select(SuggestionId::from(1)))
        .unwrap();
    runtime.dispatch(Intent::Apply).unwrap();
    runtime.settle().await;

    let state = runtime.state();
    assert_eq!(state.status(), SessionStatus::Ready);
    assert!(state.dataset().unwrap().has_column("title0"));
    assert!(state.selection().is_none());

    let history = state.history();
    assert_eq!(history.len(), 1);
    let record = history.last().unwrap();
    assert_eq!(record.suggestion().title(), "Split title using delimiter colon (:)");
    assert_eq!(record.applied_to(), loaded_version);
    assert!(state.version() > loaded_version);

    // The old batch is gone; only suggestions computed for the new dataset remain.
    let ids: Vec<&str> = state.suggestions().iter().map(|s| s.id().as_str()).collect();
    assert_eq!(ids, ["2"]);
    assert_eq!(state.suggestions().version(), state.version());
}

#[tokio::test]
async fn rejected_apply_keeps_dataset_and_selection() {
    let server = start_backend().await;
    mount_loaded_911(&server).await;
    mount_error(
        &server,
        "POST",
        "/api/apply-transformation",
        422,
        "column 'title' not found",
    )
    .await;

    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime
        .dispatch(Intent::Upload(write_911_csv(dir.path())))
        .unwrap();
    runtime.settle().await;
    let before = runtime.state().dataset().cloned();

    runtime
        .dispatch(Intent::Select(SuggestionId::from(1)))
        .unwrap();
    runtime.dispatch(Intent::Apply).unwrap();
    runtime.settle().await;

    let state = runtime.state();
    assert_eq!(
        state.status(),
        SessionStatus::Error("column 'title' not found".into())
    );
    assert_eq!(state.dataset().cloned(), before);
    assert_eq!(state.selection(), Some(&SuggestionId::from(1)));
    assert!(state.history().is_empty());

    runtime.dispatch(Intent::DismissError).unwrap();
    assert_eq!(runtime.state().status(), SessionStatus::Ready);
}

#[tokio::test]
async fn upload_rejected_by_backend_commits_nothing() {
    let server = start_backend().await;
    mount_error(&server, "POST", "/api/upload", 415, "Unsupported file type").await;

    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime
        .dispatch(Intent::Upload(write_911_csv(dir.path())))
        .unwrap();
    runtime.settle().await;

    let state = runtime.state();
    assert_eq!(
        state.status(),
        SessionStatus::Error("Unsupported file type".into())
    );
    assert!(state.dataset().is_none());
    assert!(state.suggestions().is_empty());
    assert_eq!(request_paths(&server).await, ["/api/upload"]);
}

#[tokio::test]
async fn unsupported_extension_never_reaches_backend() {
    let server = start_backend().await;
    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());

    let result = runtime.dispatch(Intent::Upload(dir.path().join("notes.txt")));
    assert!(matches!(result, Err(Rejected::UnsupportedFile(_))));
    assert_eq!(runtime.state().status(), SessionStatus::Empty);
    assert_eq!(runtime.state().notice().unwrap().level, NoticeLevel::Warning);
    assert!(request_paths(&server).await.is_empty());
}

#[tokio::test]
async fn startup_sync_without_data_stays_empty() {
    let server = start_backend().await;
    mount_error(&server, "GET", "/api/data", 404, "No data uploaded").await;

    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime.dispatch(Intent::Sync).unwrap();
    runtime.settle().await;

    assert_eq!(runtime.state().status(), SessionStatus::Empty);
    assert_eq!(request_paths(&server).await, ["/api/data"]);
}

#[tokio::test]
async fn startup_sync_picks_up_existing_dataset() {
    let server = start_backend().await;
    mount_data(&server, calls_911()).await;
    mount_suggestions(&server, vec![split_title()]).await;

    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime.dispatch(Intent::Sync).unwrap();
    runtime.settle().await;

    let state = runtime.state();
    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(state.dataset().unwrap().row_count(), 3);
    assert_eq!(state.suggestions().len(), 1);
}

#[tokio::test]
async fn export_csv_writes_download_into_export_dir() {
    let server = start_backend().await;
    mount_loaded_911(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/export-csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    "attachment; filename=\"911_cleaned.csv\"",
                )
                .set_body_string("zip,title\n19525,EMS: BACK PAINS/INJURY\n"),
        )
        .mount(&server)
        .await;

    let source = tempdir().unwrap();
    let exports = tempdir().unwrap();
    let mut runtime = runtime_for(&server, exports.path());
    runtime
        .dispatch(Intent::Upload(write_911_csv(source.path())))
        .unwrap();
    runtime.settle().await;

    runtime.dispatch(Intent::ExportData).unwrap();
    runtime.settle().await;

    let written = std::fs::read_to_string(exports.path().join("911_cleaned.csv")).unwrap();
    assert_eq!(written, "zip,title\n19525,EMS: BACK PAINS/INJURY\n");
    let state = runtime.state();
    assert_eq!(state.status(), SessionStatus::Ready);
    assert!(state.notice().unwrap().text.starts_with("Exported "));
}

#[tokio::test]
async fn export_named_like_an_existing_file_does_not_replace_it() {
    let server = start_backend().await;
    mount_loaded_911(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/export-csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"911.csv\"")
                .set_body_string("zip,title\n19525,EMS: BACK PAINS/INJURY\n"),
        )
        .mount(&server)
        .await;

    // Upload straight out of the export directory.
    let dir = tempdir().unwrap();
    let source = write_911_csv(dir.path());
    let original = std::fs::read(&source).unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime.dispatch(Intent::Upload(source.clone())).unwrap();
    runtime.settle().await;
    runtime.dispatch(Intent::ExportData).unwrap();
    runtime.settle().await;

    assert_eq!(std::fs::read(&source).unwrap(), original);
    let written = std::fs::read_to_string(source.with_file_name("911 (1).csv")).unwrap();
    assert_eq!(written, "zip,title\n19525,EMS: BACK PAINS/INJURY\n");
}

#[tokio::test]
async fn export_failure_is_only_a_notice() {
    let server = start_backend().await;
    mount_loaded_911(&server).await;
    mount_error(&server, "GET", "/api/export-csv", 500, "disk full").await;

    let dir = tempdir().unwrap();
    let mut runtime = runtime_for(&server, dir.path());
    runtime
        .dispatch(Intent::Upload(write_911_csv(dir.path())))
        .unwrap();
    runtime.settle().await;
    runtime.dispatch(Intent::ExportData).unwrap();
    runtime.settle().await;

    let state = runtime.state();
    assert_eq!(state.status(), SessionStatus::Ready);
    let notice = state.notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert!(notice.text.contains("disk full"), "{}", notice.text);
}

#[tokio::test]
async fn unreachable_backend_surfaces_transport_error() {
    let config = GatewayConfig::new("http://127.0.0.1:9/api").unwrap();
    let dir = tempdir().unwrap();
    let mut runtime = SessionRuntime::new(HttpGateway::new(config).unwrap(), dir.path());

    runtime.dispatch(Intent::Sync).unwrap();
    runtime.settle().await;

    let SessionStatus::Error(message) = runtime.state().status() else {
        panic!("expected an error status");
    };
    assert!(message.starts_with("Backend unreachable"), "{message}");
}
