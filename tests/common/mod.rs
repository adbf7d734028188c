//! Shared test utilities and fixtures
//!
//! A wiremock stand-in for the wrangling backend plus canned payloads modelled on
//! the 911-calls dataset.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wrangle_engine::{GatewayConfig, HttpGateway, SessionRuntime};

/// Start a mock backend. Routes live under `/api`, like the real service.
pub async fn start_backend() -> MockServer {
    MockServer::start().await
}

pub fn gateway_for(server: &MockServer) -> HttpGateway {
    let config = GatewayConfig::new(&format!("{}/api", server.uri())).unwrap();
    HttpGateway::new(config).unwrap()
}

pub fn runtime_for(server: &MockServer, export_dir: &Path) -> SessionRuntime<HttpGateway> {
    SessionRuntime::new(gateway_for(server), export_dir)
}

/// Write a small 911.csv into `dir` and return its path.
pub fn write_911_csv(dir: &Path) -> PathBuf {
    let path = dir.join("911.csv");
    std::fs::write(
        &path,
        "lat,lng,zip,title,twp\n40.2978759,-75.5812935,19525,EMS: BACK PAINS/INJURY,NEW HANOVER\n",
    )
    .unwrap();
    path
}

pub fn calls_911() -> Value {
    json!({
        "data": [
            {"lat": 40.2978759, "lng": -75.5812935, "zip": 19525, "title": "EMS: BACK PAINS/INJURY", "twp": "NEW HANOVER"},
            {"lat": 40.2580614, "lng": -75.2646799, "zip": 19446, "title": "EMS: DIABETIC EMERGENCY", "twp": "HATFIELD TOWNSHIP"},
            {"lat": 40.1211818, "lng": -75.3519752, "title": "Fire: GAS-ODOR/LEAK", "twp": "NORRISTOWN"},
        ],
        "columns": ["lat", "lng", "zip", "title", "twp"],
    })
}

/// The 911 dataset after splitting `title` on the colon.
pub fn calls_911_split() -> Value {
    json!({
        "new_data": [
            {"lat": 40.2978759, "zip": 19525, "title": "EMS: BACK PAINS/INJURY", "title0": "EMS", "title1": " BACK PAINS/INJURY"},
            {"lat": 40.2580614, "zip": 19446, "title": "EMS: DIABETIC EMERGENCY", "title0": "EMS", "title1": " DIABETIC EMERGENCY"},
            {"lat": 40.1211818, "title": "Fire: GAS-ODOR/LEAK", "title0": "Fire", "title1": " GAS-ODOR/LEAK"},
        ],
        "columns": ["lat", "zip", "title", "title0", "title1"],
    })
}

pub fn split_title() -> Value {
    json!({
        "id": 1,
        "type": "split_column",
        "title": "Split title using delimiter colon (:)",
        "explanation": "Column 'title' holds a category and a description separated by ':'",
        "column": "title",
        "delimiter": ":",
        "code": "df[['title0', 'title1']] = df['title'].str.split(':', expand=True)",
    })
}

pub fn drop_lng() -> Value {
    json!({
        "id": 2,
        "type": "drop_column",
        "title": "Drop column lng",
        "explanation": "Longitude is redundant with the township",
        "column": "lng",
    })
}

pub async fn mount_upload_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "message": "File uploaded successfully"})),
        )
        .mount(server)
        .await;
}

pub async fn mount_data(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_suggestions(server: &MockServer, suggestions: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/suggestions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"suggestions": suggestions})))
        .mount(server)
        .await;
}

/// Serve `suggestions` for exactly one request; later requests fall through to
/// mocks mounted afterwards.
pub async fn mount_suggestions_once(server: &MockServer, suggestions: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/suggestions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"suggestions": suggestions})))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

pub async fn mount_error(server: &MockServer, http_method: &str, route: &str, status: u16, message: &str) {
    Mock::given(method(http_method))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"error": message})))
        .mount(server)
        .await;
}

/// Mount the full happy-path backend for an upload of the 911 dataset.
pub async fn mount_loaded_911(server: &MockServer) {
    mount_upload_ok(server).await;
    mount_data(server, calls_911()).await;
    mount_suggestions_once(server, vec![split_title(), drop_lng()]).await;
}
