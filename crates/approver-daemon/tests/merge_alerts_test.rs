//! Merge-alert delivery scenarios against a recording chat webhook.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

use approver_daemon::app::App;
use approver_daemon::dispatch;
use common::FakeForge;

const SECRET: &str = "webhook-secret";

const ALERT_POLICY: &str = r#"
pull_request_approval_rules:
- target_branches:
  - master
  alerts:
  - regex: emergency
    slack_message: '{"text": "merged {{ .pull_request.html_url }}"}'
"#;

type Deliveries = Arc<Mutex<Vec<serde_json::Value>>>;

async fn start_chat_webhook() -> (SocketAddr, Deliveries) {
    let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));

    async fn receive(
        State(deliveries): State<Deliveries>,
        axum::Json(message): axum::Json<serde_json::Value>,
    ) -> StatusCode {
        deliveries.lock().unwrap().push(message);
        StatusCode::OK
    }

    let router = Router::new()
        .route("/hook", post(receive))
        .with_state(Arc::clone(&deliveries));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, deliveries)
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn merge_event(body_text: &str) -> Vec<u8> {
    json!({
        "action": "closed",
        "pull_request": {
            "number": 17,
            "body": body_text,
            "merged": true,
            "base": {"ref": "master"},
            "labels": [],
            "statuses_url": "https://api.github.com/repos/acme/svc/statuses/abc123",
            "html_url": "https://github.com/acme/svc/pull/17",
            "user": {"login": "dev"}
        },
        "repository": {
            "name": "svc",
            "full_name": "acme/svc",
            "owner": {"login": "acme"}
        }
    })
    .to_string()
    .into_bytes()
}

async fn deliver(app: App, body: Vec<u8>) -> StatusCode {
    let signature = sign(&body);
    let router = dispatch::router(Arc::new(app));
    let response = router
        .oneshot(
            Request::post("/events")
                .header("X-GitHub-Event", "pull_request")
                .header("X-GitHub-Delivery", "delivery-merge")
                .header("X-Hub-Signature-256", signature)
                .body(axum::body::Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

#[tokio::test]
async fn matching_alert_is_rendered_and_delivered() {
    let (addr, deliveries) = start_chat_webhook().await;
    let forge = Arc::new(FakeForge {
        configuration: Some(ALERT_POLICY.to_owned()),
        ..FakeForge::default()
    });

    let app = App::new(Arc::clone(&forge) as Arc<dyn approver_core::forge::ForgeClient>)
        .with_webhook_secret(SECRET.as_bytes().to_vec())
        .with_slack_webhook_url(format!("http://{addr}/hook"));

    let status = deliver(app, merge_event("an EMERGENCY change was merged")).await;
    assert_eq!(status, StatusCode::OK);

    let received = deliveries.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0]["text"],
        "merged https://github.com/acme/svc/pull/17"
    );
    // The merge path never touches the approval engine's writes.
    assert!(forge.recorded_writes().is_empty());
}

#[tokio::test]
async fn non_matching_alert_stays_silent() {
    let (addr, deliveries) = start_chat_webhook().await;
    let forge = Arc::new(FakeForge {
        configuration: Some(ALERT_POLICY.to_owned()),
        ..FakeForge::default()
    });

    let app = App::new(Arc::clone(&forge) as Arc<dyn approver_core::forge::ForgeClient>)
        .with_webhook_secret(SECRET.as_bytes().to_vec())
        .with_slack_webhook_url(format!("http://{addr}/hook"));

    let status = deliver(app, merge_event("a routine change")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(deliveries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unconfigured_webhook_url_disables_the_alert_path() {
    let forge = Arc::new(FakeForge {
        configuration: Some(ALERT_POLICY.to_owned()),
        ..FakeForge::default()
    });

    let app = App::new(Arc::clone(&forge) as Arc<dyn approver_core::forge::ForgeClient>)
        .with_webhook_secret(SECRET.as_bytes().to_vec());

    let status = deliver(app, merge_event("an EMERGENCY change was merged")).await;
    assert_eq!(status, StatusCode::OK);
    // With no webhook configured, the config is never even fetched.
    assert_eq!(forge.total_calls(), 0);
}

#[tokio::test]
async fn failed_delivery_surfaces_a_server_error() {
    // Nothing listens on this port.
    let forge = Arc::new(FakeForge {
        configuration: Some(ALERT_POLICY.to_owned()),
        ..FakeForge::default()
    });

    let app = App::new(Arc::clone(&forge) as Arc<dyn approver_core::forge::ForgeClient>)
        .with_webhook_secret(SECRET.as_bytes().to_vec())
        .with_slack_webhook_url("http://127.0.0.1:1/hook");

    let status = deliver(app, merge_event("an EMERGENCY change was merged")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
