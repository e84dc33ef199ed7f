//! Integration tests against an in-process stub of the conversion service.
//!
//! The stub is an `axum` app bound to `127.0.0.1:0`, serving the same two
//! endpoints as the real backend:
//!
//!   GET  /api/v1/capabilities
//!   POST /api/v1/convert   (multipart: file, target_format)
//!
//! It converts `.json` → `.md` and rejects everything else with a
//! `{"detail": ...}` body, which is enough to exercise every session path
//! over real HTTP.

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use formatbridge::{
    BridgeError, CatalogView, ClientConfig, ConverterClient, FormatId, SessionEvent,
    SessionState, UploadFile,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

// ── Stub server ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct ReceivedUpload {
    file_name: Option<String>,
    target_format: Option<String>,
    bytes: usize,
}

#[derive(Clone)]
struct Stub {
    capabilities: Value,
    capabilities_status: StatusCode,
    send_disposition: bool,
    accepted_target: &'static str,
    received: Arc<Mutex<Vec<ReceivedUpload>>>,
}

impl Stub {
    fn new(capabilities: Value) -> Self {
        Self {
            capabilities,
            capabilities_status: StatusCode::OK,
            send_disposition: true,
            accepted_target: ".md",
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

async fn capabilities(State(stub): State<Stub>) -> Response {
    (stub.capabilities_status, Json(stub.capabilities.clone())).into_response()
}

async fn convert(State(stub): State<Stub>, mut multipart: Multipart) -> Response {
    let mut upload = ReceivedUpload {
        file_name: None,
        target_format: None,
        bytes: 0,
    };
    let mut content = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                content = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                upload.bytes = content.len();
            }
            "target_format" => upload.target_format = field.text().await.ok(),
            _ => {}
        }
    }
    stub.received.lock().unwrap().push(upload.clone());

    let name = upload.file_name.unwrap_or_default();
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return reject("Unsupported file format: ");
    };
    if ext != "json" {
        return reject(&format!("Unsupported file format: .{ext}"));
    }
    if upload.target_format.as_deref() != Some(stub.accepted_target) {
        let got = upload.target_format.unwrap_or_default();
        return reject(&format!("Unsupported target format: {got}"));
    }

    let body = format!(
        "# Converted JSON Data\n\n```json\n{}\n```\n",
        String::from_utf8_lossy(&content)
    );
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        "application/octet-stream".parse().unwrap(),
    );
    if stub.send_disposition {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{stem}.md\"").parse().unwrap(),
        );
    }
    response
}

fn reject(detail: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
}

/// Start the stub and return its base URL.
async fn spawn(stub: Stub) -> String {
    let app = Router::new()
        .route("/api/v1/capabilities", get(capabilities))
        .route("/api/v1/convert", post(convert))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server failed");
    });
    format!("http://{addr}")
}

fn client_for(base_url: &str) -> ConverterClient {
    let config = ClientConfig::builder().base_url(base_url).build().unwrap();
    ConverterClient::new(config).unwrap()
}

fn json_upload() -> UploadFile {
    UploadFile::new("data.json", br#"{"test": "ok"}"#.to_vec()).with_mime("application/json")
}

// ── Catalog ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn loads_bare_capability_map() {
    let url = spawn(Stub::new(json!({".json": [".md"], ".pdf": [".docx", ".png"]}))).await;
    let mut client = client_for(&url);
    let map = client.load_catalog().await.unwrap();
    assert_eq!(map.len(), 2);

    let sources: Vec<String> = client
        .catalog()
        .search("docx")
        .into_iter()
        .map(|e| e.source.to_string())
        .collect();
    assert_eq!(sources, vec![".pdf"]);
}

#[tokio::test]
async fn loads_nested_capability_map() {
    let url = spawn(Stub::new(json!({"conversions": {".json": [".md"]}}))).await;
    let mut client = client_for(&url);
    client.load_catalog().await.unwrap();
    assert!(client
        .catalog()
        .map()
        .unwrap()
        .supports(&FormatId::new(".json"), &FormatId::new(".md")));
}

#[tokio::test]
async fn server_error_renders_load_error() {
    let stub = Stub {
        capabilities_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..Stub::new(json!({}))
    };
    let url = spawn(stub).await;
    let mut client = client_for(&url);

    let err = client.load_catalog().await.unwrap_err();
    assert!(matches!(err, BridgeError::CapabilityLoad { .. }), "got {err:?}");
    assert!(matches!(
        client.catalog().render(""),
        CatalogView::LoadError { .. }
    ));
}

#[tokio::test]
async fn malformed_payload_renders_load_error() {
    let url = spawn(Stub::new(json!([".json", ".md"]))).await;
    let mut client = client_for(&url);
    let err = client.load_catalog().await.unwrap_err();
    assert!(matches!(err, BridgeError::CapabilityPayload { .. }), "got {err:?}");
    assert!(client.catalog().load_error().is_some());
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_conversion_sends_multipart_and_names_result() {
    let stub = Stub::new(json!({".json": [".md"]}));
    let received = stub.received.clone();
    let url = spawn(stub).await;
    let mut client = client_for(&url);
    client.load_catalog().await.unwrap();

    let mut session = client
        .open_session(&".json".into(), &".md".into())
        .unwrap();
    let artifact = client.submit(&mut session, &json_upload()).await.unwrap();
    assert_eq!(artifact.filename(), "data.md");
    let text = String::from_utf8(artifact.bytes().to_vec()).unwrap();
    assert!(text.contains("# Converted JSON Data"));
    assert!(text.contains(r#""test": "ok""#));

    let received = received.lock().unwrap();
    assert_eq!(
        received.as_slice(),
        &[ReceivedUpload {
            file_name: Some("data.json".into()),
            target_format: Some(".md".into()),
            bytes: 14,
        }]
    );
}

#[tokio::test]
async fn target_format_is_sent_as_the_server_declared_it() {
    let stub = Stub {
        accepted_target: ".MD",
        ..Stub::new(json!({".json": [".MD"]}))
    };
    let received = stub.received.clone();
    let url = spawn(stub).await;
    let mut client = client_for(&url);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data.json");
    std::fs::write(&input, b"{}").unwrap();
    let report = client
        .convert_file(&input, &FormatId::new("md"), dir.path())
        .await
        .unwrap();
    assert_eq!(report.output, dir.path().join("data.md"));

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].target_format.as_deref(), Some(".MD"));
}

#[tokio::test]
async fn missing_disposition_falls_back_to_generic_name() {
    let stub = Stub {
        send_disposition: false,
        ..Stub::new(json!({".json": [".md"]}))
    };
    let url = spawn(stub).await;
    let mut client = client_for(&url);
    client.load_catalog().await.unwrap();

    let mut session = client
        .open_session(&".json".into(), &".md".into())
        .unwrap();
    let artifact = client.submit(&mut session, &json_upload()).await.unwrap();
    assert_eq!(artifact.filename(), "converted-file.md");
}

#[tokio::test]
async fn rejected_conversion_surfaces_detail() {
    // The catalog claims .txt works; the server disagrees.
    let url = spawn(Stub::new(json!({".txt": [".md"]}))).await;
    let mut client = client_for(&url);
    client.load_catalog().await.unwrap();

    let mut session = client
        .open_session(&".txt".into(), &".md".into())
        .unwrap();
    let upload = UploadFile::new("notes.txt", b"hello".to_vec());
    let err = client.submit(&mut session, &upload).await.unwrap_err();

    assert!(matches!(
        err,
        BridgeError::ConversionRequest { status: 400, .. }
    ));
    assert_eq!(
        session.state(),
        &SessionState::Failed {
            message: "Unsupported file format: .txt".into()
        }
    );
    assert!(session.view().intake_visible);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    // Grab a free port, then close it again.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"));
    let mut session = formatbridge::ConversionSession::new(formatbridge::ConversionSelection::new(
        ".json".into(),
        ".md".into(),
    ));
    let err = client.submit(&mut session, &json_upload()).await.unwrap_err();
    assert!(matches!(err, BridgeError::ConversionTransport { .. }), "got {err:?}");
    assert!(matches!(session.state(), SessionState::Failed { message } if !message.is_empty()));
}

#[tokio::test]
async fn retry_after_failure_then_two_successes_keep_one_artifact() {
    let url = spawn(Stub::new(json!({".json": [".md"]}))).await;
    let mut client = client_for(&url);
    client.load_catalog().await.unwrap();
    let mut session = client
        .open_session(&".json".into(), &".md".into())
        .unwrap();

    let bad = UploadFile::new("data.csv", b"a,b".to_vec());
    assert!(client.submit(&mut session, &bad).await.is_err());

    let first = client
        .submit(&mut session, &json_upload())
        .await
        .unwrap()
        .id();
    let second = client
        .submit(&mut session, &json_upload())
        .await
        .unwrap()
        .id();
    assert_ne!(first, second);
    assert_eq!(session.artifact().map(|a| a.id()), Some(second));

    session.dispatch(SessionEvent::Reset).unwrap();
    assert_eq!(session.state(), &SessionState::Idle);
    assert!(session.selection().is_none());
    assert!(session.artifact().is_none());
    assert!(session.intake_visible());
}

#[tokio::test]
async fn convert_file_writes_result_to_directory() {
    let url = spawn(Stub::new(json!({".json": [".md"]}))).await;
    let mut client = client_for(&url);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.json");
    std::fs::write(&input, br#"{"k": 1}"#).unwrap();
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let report = client
        .convert_file(&input, &FormatId::new("md"), &out_dir)
        .await
        .unwrap();
    assert_eq!(report.output, out_dir.join("report.md"));
    assert_eq!(report.source, FormatId::new(".json"));
    let written = std::fs::read_to_string(&report.output).unwrap();
    assert!(written.starts_with("# Converted JSON Data"));
}

#[tokio::test]
async fn convert_file_refuses_pairs_outside_catalog() {
    let url = spawn(Stub::new(json!({".json": [".md"]}))).await;
    let mut client = client_for(&url);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.json");
    std::fs::write(&input, b"{}").unwrap();

    let err = client
        .convert_file(&input, &FormatId::new(".pdf"), dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedTarget { .. }), "got {err:?}");
}
