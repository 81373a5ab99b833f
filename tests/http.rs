use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use emis_alert::config::AppConfig;
use emis_alert::db::MemoryStore;
use emis_alert::notify::{Campaign, NoopNotifier, Notifier};
use emis_alert::App;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

fn config() -> AppConfig {
    let mut config = AppConfig::load().unwrap();
    config.api_version = "1.0.0".to_string();
    config.alert_model_name = "Alert".to_string();
    config.alert_collection_name = "alerts".to_string();
    config.alert_source_collection_name = "alertsources".to_string();
    config.alert_seed = "alerts".to_string();
    config.alert_source_seed = "alertsources".to_string();
    config.seeds_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds");
    config
}

async fn app_with(notifier: Arc<dyn Notifier>) -> App {
    App::new(&config(), Arc::new(MemoryStore::new()), notifier)
        .await
        .unwrap()
}

async fn app() -> App {
    app_with(Arc::new(NoopNotifier)).await
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn source(name: &str, mobile: &str, email: &str) -> Value {
    json!({
        "name": name,
        "mobile": mobile,
        "email": email,
        "url": "https://www.meteo.go.tz/feeds/alerts.xml",
        "website": "https://www.meteo.go.tz"
    })
}

#[tokio::test]
async fn post_alert_derives_fields() {
    let router = app().await.router();

    let (status, body) = send(
        &router,
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Strong Winds", "area": "Dar es salaam", "severity": "Severe" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(!body["number"].as_str().unwrap().is_empty());
    assert_eq!(body["color"], "#FE9901");
    assert_eq!(body["direction"], "Inbound");
    assert_eq!(body["headline"], "Strong Winds");
    assert!(body["_id"].is_string());
    assert!(body["createdAt"].is_string());
    assert!(body["reportedAt"].is_string());
}

#[tokio::test]
async fn invalid_alert_returns_field_errors() {
    let router = app().await.router();

    let (status, body) = send(&router, "POST", "/v1/alerts", Some(json!({ "severity": "Minor" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["errors"]["event"].is_array());
    assert!(body["error"]["errors"]["area"].is_array());

    let (status, body) = send(
        &router,
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Flood", "area": "Ilala", "severity": "Catastrophic" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["errors"]["severity"][0]["code"], "enum");

    let (status, body) = send(
        &router,
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Flood", "area": "Ilala", "urgency": "Soon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["errors"]["urgency"].is_array());
    assert_eq!(body["error"]["errors"]["urgency"][0]["code"], "enum");
}

#[tokio::test]
async fn malformed_json_and_ids_are_bad_requests() {
    let router = app().await.router();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/alerts")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, "GET", "/v1/alerts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(&router, "GET", "/v1/alerts?limit=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_alert_is_not_found() {
    let router = app().await.router();

    let uri = format!("/v1/alerts/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&router, "GET", &uri, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Not Found");
}

#[tokio::test]
async fn list_returns_page_envelope() {
    let router = app().await.router();

    for i in 0..32 {
        let (status, _) = send(
            &router,
            "POST",
            "/v1/alerts",
            Some(json!({ "event": format!("Flood {i}"), "area": "Jangwani" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&router, "GET", "/v1/alerts?page=1&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);
    assert_eq!(body["total"], 32);
    assert_eq!(body["size"], 10);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["skip"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pages"], 4);
    assert!(body["lastModified"].is_string());

    let (_, body) = send(&router, "GET", "/v1/alerts?q=flood%2031", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["event"], "Flood 31");

    let (_, body) = send(&router, "GET", "/v1/alerts?event=Flood%207", None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&router, "GET", "/v1/alerts?sort=event&limit=2", None).await;
    assert_eq!(body["data"][0]["event"], "Flood 0");
    assert_eq!(body["data"][1]["event"], "Flood 1");

    let (status, body) = send(&router, "GET", "/v1/alerts?select=event&populate=agency", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 32);

    let created_at = body["data"][0]["createdAt"].as_str().unwrap().to_string();
    let uri = format!("/v1/alerts?createdAt={}", created_at);
    let (status, body) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["total"].as_i64().unwrap() >= 1);
    for alert in body["data"].as_array().unwrap() {
        assert_eq!(alert["createdAt"], created_at.as_str());
    }
}

#[tokio::test]
async fn patch_and_put_update_alert() {
    let router = app().await.router();

    let (_, created) = send(
        &router,
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Flood", "area": "Ilala", "severity": "Minor" })),
    )
    .await;
    let uri = format!("/v1/alerts/{}", created["_id"].as_str().unwrap());

    let (status, patched) = send(&router, "PATCH", &uri, Some(json!({ "severity": "Extreme" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["color"], "#D72E29");
    assert_eq!(patched["area"], "Ilala");
    assert_eq!(patched["number"], created["number"]);

    let (status, replaced) = send(
        &router,
        "PUT",
        &uri,
        Some(json!({ "event": "Drought", "area": "Dodoma" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["event"], "Drought");
    assert_eq!(replaced["severity"], "Unknown");
    assert_eq!(replaced["color"], "#3366FF");
    assert_eq!(replaced["_id"], created["_id"]);
    assert_eq!(replaced["number"], created["number"]);
    assert_eq!(replaced["reportedAt"], created["reportedAt"]);
}

#[tokio::test]
async fn deleting_alert_twice_is_not_found() {
    let router = app().await.router();

    let (_, created) = send(
        &router,
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Flood", "area": "Ilala" })),
    )
    .await;
    let uri = format!("/v1/alerts/{}", created["_id"].as_str().unwrap());

    let (status, deleted) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["_id"], created["_id"]);

    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_source_is_soft() {
    let router = app().await.router();

    let (status, created) = send(
        &router,
        "POST",
        "/v1/alertsources",
        Some(source("tanzania meteorological agency", "255222460706", "met@meteo.go.tz")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Tanzania Meteorological Agency");

    let uri = format!("/v1/alertsources/{}", created["_id"].as_str().unwrap());
    let (status, deleted) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(deleted["deletedAt"].is_string());

    let (status, _) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = send(&router, "GET", "/v1/alertsources", None).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn duplicate_source_email_conflicts() {
    let router = app().await.router();

    let (status, _) = send(
        &router,
        "POST",
        "/v1/alertsources",
        Some(source("Tanzania Meteorological Agency", "255222460706", "met@meteo.go.tz")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        "POST",
        "/v1/alertsources",
        Some(source("Another Agency", "255700000000", "MET@meteo.go.tz")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_VALUE");
    assert!(body["error"]["errors"]["email"].is_array());
}

#[tokio::test]
async fn source_schema_is_served() {
    let router = app().await.router();

    let (status, body) = send(&router, "GET", "/v1/alertsources/schema", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "AlertSource");
    assert!(body["properties"]["email"].is_object());
}

#[tokio::test]
async fn seeded_alerts_resolve_agencies_and_project_to_cap() {
    let app = app().await;
    app.seed().await.unwrap();
    app.seed().await.unwrap();
    let router = app.router();

    let (_, sources) = send(&router, "GET", "/v1/alertsources", None).await;
    assert_eq!(sources["total"], 2);

    let (_, alerts) = send(&router, "GET", "/v1/alerts", None).await;
    assert_eq!(alerts["total"], 3);

    let uri = "/v1/alerts/9c3a1d52-6f0e-4b7a-8a8e-3f2b1c0d4e02";
    let (status, flood) = send(&router, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flood["source"], "Tanzania Meteorological Agency");
    assert_eq!(flood["agency"]["email"], "met@meteo.go.tz");
    assert_eq!(flood["color"], "#D72E29");
    assert_eq!(flood["centroid"]["type"], "Point");

    let (status, cap) = send(&router, "GET", &format!("{uri}/cap"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cap["identifier"], "MET-2018-000002-TZA");
    assert_eq!(cap["info"]["severity"], "Extreme");
    assert_eq!(cap["message"]["status"], "Actual");
    assert_eq!(cap["source"]["phone"], "255222460706");
}

struct CountingNotifier {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn dispatch(&self, _campaign: Campaign) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("broker unavailable");
        }
        Ok(())
    }
}

#[tokio::test]
async fn campaigns_go_out_on_post_only() {
    let notifier = Arc::new(CountingNotifier {
        calls: AtomicUsize::new(0),
        fail: false,
    });
    let app = app_with(notifier.clone()).await;
    app.seed().await.unwrap();
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);

    let (status, _) = send(
        &app.router(),
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Flood", "area": "Ilala" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_notifier_does_not_fail_post() {
    let notifier = Arc::new(CountingNotifier {
        calls: AtomicUsize::new(0),
        fail: true,
    });
    let router = app_with(notifier.clone()).await.router();

    let (status, _) = send(
        &router,
        "POST",
        "/v1/alerts",
        Some(json!({ "event": "Flood", "area": "Ilala" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn info_and_unknown_routes() {
    let router = app().await.router();

    let (status, body) = send(&router, "GET", "/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "emis-alert");
    assert_eq!(body["license"], "MIT");

    let (status, body) = send(&router, "GET", "/v2/alerts", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
