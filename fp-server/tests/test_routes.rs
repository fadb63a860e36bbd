//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use fp_api::{SentMessage, SmsSender};
use fp_core::config::{AppConfig, ConfigHandle, DatabaseConfig};
use fp_core::error::FpResult;
use fp_models::Database;
use fp_server::{build_router, AppState};
use fp_services::{Providers, ServiceRegistry};

#[derive(Default)]
struct RecordingSms {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send_sms(&self, to: &str, _body: &str) -> FpResult<SentMessage> {
        self.sent.lock().unwrap().push(to.to_string());
        Ok(SentMessage {
            provider_message_id: "SM123".into(),
            status: "queued".into(),
        })
    }

    fn from_number(&self) -> Option<String> {
        Some("+61800000000".into())
    }
}

struct TestApp {
    router: Router,
    sms: Arc<RecordingSms>,
    _dir: TempDir,
}

async fn app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = Database::init(&dir.path().join("test.db"), &DatabaseConfig::default()).unwrap();
    let sms = Arc::new(RecordingSms::default());
    let providers = Providers {
        sms: Some(sms.clone()),
        bank: None,
    };
    let registry = ServiceRegistry::new(ConfigHandle::new(AppConfig::default()), db, providers).await;
    registry.init_all().await.unwrap();
    let router = build_router(AppState::new(Arc::new(registry)), &[]);
    TestApp { router, sms, _dir: dir }
}

async fn call(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_client(app: &TestApp, name: &str, phone: &str) -> i64 {
    let (status, body) = call(
        app,
        "POST",
        "/api/clients",
        Some(json!({ "name": name, "phone": phone })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_lists_services() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let services = body["data"]["services"].as_array().unwrap();
    assert_eq!(services.len(), 3);
    let bank = services.iter().find(|s| s["name"] == "reconciliation").unwrap();
    assert_eq!(bank["state"], "degraded");
    assert!(bank["detail"].as_str().unwrap().contains("Open Banking"));
}

#[tokio::test]
async fn client_crud_and_not_found_envelope() {
    let app = app().await;
    let id = create_client(&app, "Jane Citizen", "0412 000 001").await;

    let (status, body) = call(&app, "GET", &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["clientType"], "public");

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/api/clients/{id}"),
        Some(json!({ "name": "Jane Citizen", "clientType": "trade" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["clientType"], "trade");

    let (status, _) = call(&app, "DELETE", &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn quote_send_then_accept_opens_job() {
    let app = app().await;
    let client_id = create_client(&app, "Jane Citizen", "0412 000 001").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/quotes",
        Some(json!({ "clientId": client_id, "totalAmount": "4850.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let quote_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["quoteNumber"], "Q-00001");

    let (_, body) = call(&app, "POST", &format!("/api/quotes/{quote_id}/send"), None).await;
    assert_eq!(body["data"]["status"], "sent");
    assert!(body["data"]["sentAt"].is_string());

    let (status, body) = call(&app, "POST", &format!("/api/quotes/{quote_id}/accept"), None).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["quoteId"], quote_id);

    let (status, _) = call(&app, "POST", &format!("/api/quotes/{quote_id}/accept"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/jobs/{job_id}/sections/posts/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["postsComplete"], true);
    assert_eq!(body["data"]["progressPercent"], 20);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/jobs/{job_id}/sections/roof/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/api/jobs/{job_id}/bom"),
        Some(json!({ "items": [
            { "description": "Colorbond panel", "quantity": "12", "unitCost": "85.50" },
            { "description": "Post", "quantity": "13", "unitCost": "22" }
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["totalCost"], "1312.00");
}

#[tokio::test]
async fn campaign_with_bad_window_is_rejected() {
    let app = app().await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/campaigns",
        Some(json!({
            "name": "Quote follow up",
            "triggerType": "quote_sent",
            "messageTemplate": "Hi {firstName}",
            "sendWindow": "9am-5pm"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call(
        &app,
        "POST",
        "/api/campaigns",
        Some(json!({
            "name": "Quote follow up",
            "triggerType": "quote_sent",
            "messageTemplate": "Hi {firstName}, {quoteNo}",
            "sendWindow": "09:00-17:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["unknownPlaceholders"], json!(["quoteNo"]));
}

#[tokio::test]
async fn import_then_run_automation() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/import/leads")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from("Name,Mobile\nSam Brown,0498 765 432\n,0400 000 000\n"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["imported"], 1);
    assert_eq!(body["data"]["errors"][0]["row"], 3);

    call(
        &app,
        "POST",
        "/api/campaigns",
        Some(json!({
            "name": "Welcome",
            "triggerType": "new_lead",
            "messageTemplate": "Thanks {firstName}!"
        })),
    )
    .await;

    let (status, body) = call(&app, "POST", "/api/automation/run", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(app.sms.sent.lock().unwrap().as_slice(), ["0498 765 432"]);

    let (_, body) = call(&app, "GET", "/api/sms/logs", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "sent");
}

#[tokio::test]
async fn unknown_import_entity_is_bad_request() {
    let app = app().await;
    let (status, _) = call(&app, "GET", "/api/import/widgets/template", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/api/import/clients/template")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
}

#[tokio::test]
async fn inbound_webhook_answers_twiml() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/sms/inbound")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("From=%2B61412000001&To=%2B61800000000&Body=Yes+please&MessageSid=SM9"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("<Response>"));

    let (_, body) = call(&app, "GET", "/api/sms/logs", None).await;
    assert_eq!(body["data"][0]["direction"], "inbound");
    assert_eq!(body["data"][0]["toNumber"], "+61800000000");
}

#[tokio::test]
async fn bank_upload_and_allocate() {
    let app = app().await;
    let (_, body) = call(
        &app,
        "POST",
        "/api/staff",
        Some(json!({ "name": "Dave Smith", "cardNumbers": "1234" })),
    )
    .await;
    let staff_id = body["data"]["id"].as_i64().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/bank/transactions/upload")
        .body(Body::from(
            "Date,Description,Amount\n01/05/2024,BUNNINGS CARD 1234,-182.35\n02/05/2024,DEPOSIT,500\n",
        ))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["imported"], 2);

    let (_, body) = call(&app, "POST", "/api/bank/transactions/auto-allocate", None).await;
    assert_eq!(body["data"]["allocated"], 1);

    let (_, body) = call(&app, "GET", "/api/bank/staff-summary", None).await;
    assert_eq!(body["data"][0]["staffMemberId"], staff_id);
    assert_eq!(body["data"][0]["total"], "182.35");

    let (status, _) = call(&app, "POST", "/api/bank/sync", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, body) = call(&app, "GET", "/api/dashboard", None).await;
    assert_eq!(body["data"]["unallocatedDebits"], 0);
}
