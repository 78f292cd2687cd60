//! Router-level tests for the submission API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use gutachten_common::{
    config::AppConfig,
    records::{InMemoryRecordStore, RecordKeeper},
    storage::{InMemoryFileStore, ObjectStoreUploader, UploadStep},
};
use gutachten_document::PdfRenderer;
use gutachten_gateway::{create_router, AppState, SubmissionPipeline};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

struct TestApp {
    router: Router,
    files: Arc<InMemoryFileStore>,
    records: Arc<InMemoryRecordStore>,
}

fn app_with(files: InMemoryFileStore, config: AppConfig) -> TestApp {
    let files = Arc::new(files);
    let records = Arc::new(InMemoryRecordStore::new());
    let pipeline = SubmissionPipeline::new(Arc::new(PdfRenderer::new()), Duration::from_secs(5))
        .with_uploader(ObjectStoreUploader::new(files.clone(), "root-folder"))
        .with_records(RecordKeeper::new(records.clone(), "Normal"));

    TestApp {
        router: create_router(AppState::new(config, pipeline)),
        files,
        records,
    }
}

fn test_app() -> TestApp {
    app_with(InMemoryFileStore::new(), AppConfig::default())
}

fn submit_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/submit-gutachten")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn nested_submission() -> Value {
    json!({
        "auftraggeber": {
            "name": "Max Mustermann",
            "kennzeichen": "BI-XX 123",
            "adresse": "Teststr 1",
            "kontakt": "max@test.de / 0151123456"
        },
        "unfallTag": "2025-01-01",
        "unfallOrt": "Bielefeld",
        "abtretung": true
    })
}

#[tokio::test]
async fn test_health_reports_services() {
    let app = test_app();

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["services"]["notion"], true);
    assert_eq!(json["services"]["googleDrive"], true);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_without_collaborators() {
    let state = AppState::from_config(AppConfig::default()).unwrap();
    let router = create_router(state);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["services"]["notion"], false);
    assert_eq!(json["services"]["googleDrive"], false);
}

#[tokio::test]
async fn test_ready() {
    let app = test_app();

    let response = app
        .router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ready");
}

#[tokio::test]
async fn test_submit_nested_payload() {
    let app = test_app();

    let response = app
        .router
        .oneshot(submit_request(nested_submission().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Gutachten erfolgreich übermittelt");

    let data = &json["data"];
    let order_number = data["orderNumber"].as_str().unwrap();
    assert!(!order_number.is_empty());
    assert_eq!(data["upload"]["status"], "succeeded");
    assert_eq!(data["contact"]["status"], "succeeded");
    assert_eq!(data["contact"]["action"], "created");
    assert_eq!(data["order"]["status"], "succeeded");
    assert!(data["document"]["sizeBytes"].as_u64().unwrap() > 0);
    assert!(data["upload"]["folderId"].is_string());
    assert!(data["upload"]["fileId"].is_string());
    assert_eq!(data["upload"]["folderCreated"], true);
    assert!(data["upload"].get("folder_id").is_none());

    assert_eq!(app.files.folders_created(), 1);
    let orders = app.records.orders();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].title.ends_with(order_number));
    assert_eq!(orders[0].incident_date.as_deref(), Some("2025-01-01"));
}

#[tokio::test]
async fn test_submit_keeps_given_order_number() {
    let app = test_app();
    let mut body = nested_submission();
    body["auftragsnummer"] = json!("GA-2025-0815");

    let response = app
        .router
        .oneshot(submit_request(body.to_string()))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["data"]["orderNumber"], "GA-2025-0815");
    assert_eq!(json["data"]["document"]["fileName"], "Gutachten_GA-2025-0815.pdf");
}

#[tokio::test]
async fn test_missing_field_returns_500_without_side_effects() {
    let app = test_app();
    let mut body = nested_submission();
    body["auftraggeber"]
        .as_object_mut()
        .unwrap()
        .remove("kennzeichen");

    let response = app
        .router
        .oneshot(submit_request(body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Pflichtfeld fehlt: auftraggeber_kennzeichen");

    assert_eq!(app.files.call_count(), 0);
    assert_eq!(app.records.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = test_app();

    let response = app
        .router
        .oneshot(submit_request("{not json".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_the_pipeline() {
    let mut config = AppConfig::default();
    config.server.body_limit_bytes = 256;
    let app = app_with(InMemoryFileStore::new(), config);

    let mut body = nested_submission();
    body["notizen"] = json!("x".repeat(1024));

    let response = app
        .router
        .oneshot(submit_request(body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
    assert_eq!(app.files.call_count(), 0);
    assert_eq!(app.records.call_count(), 0);
}

#[tokio::test]
async fn test_storage_outage_is_reported_not_fatal() {
    let app = app_with(
        InMemoryFileStore::failing_at(UploadStep::UploadFile),
        AppConfig::default(),
    );

    let response = app
        .router
        .oneshot(submit_request(nested_submission().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["upload"]["status"], "failed");
    assert_eq!(json["data"]["upload"]["step"], "upload_file");
    assert_eq!(json["data"]["order"]["status"], "succeeded");

    assert!(app.records.orders()[0].document_link.is_none());
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let mut config = AppConfig::default();
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = app_with(InMemoryFileStore::new(), config);

    let first = app
        .router
        .clone()
        .oneshot(submit_request(nested_submission().to_string()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .clone()
        .oneshot(submit_request(nested_submission().to_string()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // probes are not limited
    let health = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
