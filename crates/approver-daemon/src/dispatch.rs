//! HTTP dispatcher.
//!
//! One handler per delivery: verify the signature over the raw body, decode
//! the event, drop ignored repositories, then route merge events to the
//! alerter and everything else through the approval engine and the
//! effector. The computed status travels back in the `X-Final-Status`
//! response header.

use std::sync::Arc;

use approver_core::approval::{Approval, ApprovalError, PullRequest};
use approver_core::forge::ForgeError;
use approver_core::webhook::{Event, EventDecodeError};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use thiserror::Error;
use tracing::{info, warn};

use crate::app::App;
use crate::effector;
use crate::merge_alerts::{self, MergeAlertError};

const HEADER_GITHUB_EVENT: &str = "X-GitHub-Event";
const HEADER_GITHUB_DELIVERY: &str = "X-GitHub-Delivery";
const HEADER_HUB_SIGNATURE: &str = "X-Hub-Signature";
const HEADER_HUB_SIGNATURE_256: &str = "X-Hub-Signature-256";
const HEADER_FINAL_STATUS: &str = "X-Final-Status";

const SUPPORTED_PULL_REQUEST_ACTIONS: [&str; 4] =
    ["opened", "edited", "reopened", "synchronize"];
const SUPPORTED_REVIEW_ACTIONS: [&str; 3] = ["submitted", "edited", "dismissed"];

/// Dispatch failures that map onto client- or server-error responses.
#[derive(Debug, Error)]
enum DispatchError {
    /// Signature missing or mismatched.
    #[error("failed to validate payload: {0}")]
    Signature(String),

    /// The body does not decode into the advertised event type.
    #[error("unmarshal request body: {0}")]
    Decode(String),

    /// Event handling failed.
    #[error("failed to handle event: {0}")]
    Internal(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Signature(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// How a delivery was resolved without error.
enum Outcome {
    /// The engine ran; the status travels in `X-Final-Status`.
    Evaluated(approver_core::approval::Status),
    /// The merge-alert path ran.
    MergeHandled,
    /// Supported event, unsupported action.
    UnsupportedAction,
    /// The delivery is deliberately not handled.
    Ignored,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Evaluated(status) => (
                StatusCode::OK,
                [(HEADER_FINAL_STATUS, status.as_str())],
            )
                .into_response(),
            Self::MergeHandled | Self::UnsupportedAction => StatusCode::OK.into_response(),
            Self::Ignored => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Builds the daemon's HTTP surface.
pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/events", post(handle_event))
        // Keep backwards-compatibility.
        .route("/function/github-team-approver", post(handle_event))
        .with_state(app)
}

async fn handle_health() -> StatusCode {
    StatusCode::OK
}

async fn handle_event(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event_type = header_value(&headers, HEADER_GITHUB_EVENT);
    let delivery_id = header_value(&headers, HEADER_GITHUB_DELIVERY);

    info!(
        service_name = %app.app_name,
        delivery_id = %delivery_id,
        event_type = %event_type,
        "webhook delivery received"
    );

    match process(&app, &event_type, &headers, &body).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => {
            warn!(delivery_id = %delivery_id, error = %err, "failed to handle event");
            err.into_response()
        }
    }
}

async fn process(
    app: &App,
    event_type: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Outcome, DispatchError> {
    app.verifier
        .verify(
            body,
            headers
                .get(HEADER_HUB_SIGNATURE_256)
                .and_then(|v| v.to_str().ok()),
            headers
                .get(HEADER_HUB_SIGNATURE)
                .and_then(|v| v.to_str().ok()),
        )
        .map_err(|err| DispatchError::Signature(err.to_string()))?;

    let event = match Event::decode(event_type, body) {
        Ok(event) => event,
        Err(err @ EventDecodeError::UnsupportedType(_)) => {
            warn!(error = %err, "not handled");
            return Ok(Outcome::Ignored);
        }
        Err(EventDecodeError::Json(err)) => {
            return Err(DispatchError::Decode(err.to_string()));
        }
    };

    let repo_full_name = &event.repository().full_name;
    if app
        .ignored_repositories
        .iter()
        .any(|ignored| ignored == repo_full_name)
    {
        warn!(repo = %repo_full_name, "ignoring event: ignored repository");
        return Ok(Outcome::Ignored);
    }

    if event.is_merge() {
        return handle_merge(app, &event, body).await;
    }
    handle_pull_request(app, &event).await
}

async fn handle_merge(
    app: &App,
    event: &Event,
    body: &Bytes,
) -> Result<Outcome, DispatchError> {
    let raw_event: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| DispatchError::Decode(err.to_string()))?;
    match merge_alerts::handle(app, event, &raw_event).await {
        Ok(()) => Ok(Outcome::MergeHandled),
        Err(MergeAlertError::Forge(ForgeError::NoConfigurationFile)) => {
            warn!("ignoring event: repository has no configuration file");
            Ok(Outcome::Ignored)
        }
        Err(err) => Err(DispatchError::Internal(err.to_string())),
    }
}

async fn handle_pull_request(app: &App, event: &Event) -> Result<Outcome, DispatchError> {
    if !is_supported_action(event) {
        warn!(action = %event.action(), "ignoring action");
        return Ok(Outcome::UnsupportedAction);
    }

    let pull_request = event.pull_request();
    let repository = event.repository();
    let pr = PullRequest {
        owner: repository.owner_login().to_owned(),
        repo: repository.name.clone(),
        number: pull_request.number,
        target_branch: pull_request.base.reference.clone(),
        body: pull_request.body.clone().unwrap_or_default(),
        initial_labels: pull_request.label_names(),
        author: pull_request.user.as_ref().map(|user| user.login.clone()),
    };

    let engine = Approval::new(Arc::clone(&app.forge));
    let result = match engine.compute_approval_status(&pr).await {
        Ok(result) => result,
        Err(ApprovalError::Forge(ForgeError::NoConfigurationFile)) => {
            warn!("ignoring event: repository has no configuration file");
            return Ok(Outcome::Ignored);
        }
        Err(err) => return Err(DispatchError::Internal(err.to_string())),
    };

    effector::apply(app.forge.as_ref(), event, &result)
        .await
        .map_err(|err| DispatchError::Internal(err.to_string()))?;

    Ok(Outcome::Evaluated(result.status()))
}

fn is_supported_action(event: &Event) -> bool {
    match event {
        Event::PullRequest(_) => SUPPORTED_PULL_REQUEST_ACTIONS.contains(&event.action()),
        Event::PullRequestReview(_) => SUPPORTED_REVIEW_ACTIONS.contains(&event.action()),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}
