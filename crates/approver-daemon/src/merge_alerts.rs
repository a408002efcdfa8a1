//! Merge-alert delivery.
//!
//! For a merged-to-target event the applicable alerts are rendered over the
//! raw event payload and posted, sequentially, to the configured chat
//! webhook. An empty webhook URL disables the whole path.

use approver_core::alerts::{self, AlertError};
use approver_core::forge::ForgeError;
use approver_core::webhook::Event;
use thiserror::Error;
use tracing::{debug, trace};

use crate::app::App;

/// Failures on the merge-alert path.
#[derive(Debug, Error)]
pub enum MergeAlertError {
    /// Loading the policy failed.
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// An alert could not be prepared.
    #[error(transparent)]
    Alert(#[from] AlertError),

    /// The chat webhook rejected or never received the message.
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}

/// Handles a merge event: selects matching alerts and delivers them.
///
/// # Errors
///
/// Returns an error when the policy cannot be loaded, an alert cannot be
/// rendered, or a delivery fails. Alerts are processed sequentially, so a
/// failure aborts the remainder.
pub async fn handle(
    app: &App,
    event: &Event,
    raw_event: &serde_json::Value,
) -> Result<(), MergeAlertError> {
    let repository = event.repository();
    if app.slack_webhook_url.is_empty() {
        debug!(repo = %repository.full_name, "ignoring alerts: chat webhook not configured");
        return Ok(());
    }

    let target_branch = &event.pull_request().base.reference;
    let body = event.pull_request().body.clone().unwrap_or_default();

    let cfg = app
        .forge
        .get_configuration(repository.owner_login(), &repository.name)
        .await?;
    let alerts = alerts::alerts_for_target_branch(&cfg, target_branch);
    trace!(
        alerts = alerts.len(),
        target_branch = %target_branch,
        "alerts apply to target branch"
    );

    for alert in alerts {
        if !alerts::alert_matches(&alert, &body)? {
            continue;
        }
        trace!(pattern = %alert.regex, "matched alert expression, firing alert");

        let message = alerts::render_message(&alert, raw_event)?;
        let response = app
            .http
            .post(&app.slack_webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|err| MergeAlertError::Delivery(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MergeAlertError::Delivery(format!(
                "chat webhook answered {status}: {text}"
            )));
        }
    }
    Ok(())
}
