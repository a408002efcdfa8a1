//! Merge-alert selection and message rendering.
//!
//! On a merged-to-target event the policy's alerts are filtered by target
//! branch and body regex, their `slack_message` templates are rendered over
//! the raw event payload, and the rendered JSON is decoded into a chat
//! webhook message. Delivery itself lives in the daemon.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::{Alert, Configuration};

/// Errors raised while preparing an alert message.
#[derive(Debug, Error)]
pub enum AlertError {
    /// An alert's `regex` is not a valid pattern.
    #[error("invalid alert pattern {pattern:?}: {source}")]
    BadRegex {
        /// The offending pattern.
        pattern: String,
        /// Compilation failure.
        source: regex::Error,
    },

    /// A template placeholder does not resolve against the event payload.
    #[error("unknown template field {path:?}")]
    UnknownField {
        /// The dotted path that failed to resolve.
        path: String,
    },

    /// A placeholder is not closed.
    #[error("unterminated template placeholder")]
    UnterminatedPlaceholder,

    /// The rendered template is not a valid webhook message.
    #[error("rendered message is not valid JSON: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

/// A chat webhook message, decoded from the rendered template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Message text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Optional channel override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Optional sender name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional sender icon override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
}

/// Collects the alerts of every group whose target branches are empty or
/// contain `target_branch`.
#[must_use]
pub fn alerts_for_target_branch(cfg: &Configuration, target_branch: &str) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for group in &cfg.pull_request_approval_rules {
        if group.target_branches.is_empty()
            || group.target_branches.iter().any(|branch| branch == target_branch)
        {
            alerts.extend(group.alerts.iter().cloned());
        }
    }
    alerts
}

/// Whether the alert's pattern matches the pull-request body,
/// case-insensitively.
///
/// # Errors
///
/// Returns an error when the pattern does not compile.
pub fn alert_matches(alert: &Alert, body: &str) -> Result<bool, AlertError> {
    let pattern = RegexBuilder::new(&alert.regex)
        .case_insensitive(true)
        .build()
        .map_err(|source| AlertError::BadRegex {
            pattern: alert.regex.clone(),
            source,
        })?;
    Ok(pattern.is_match(body))
}

/// Renders the alert's message template over the event payload and decodes
/// the result as a webhook message.
///
/// # Errors
///
/// Returns an error when a placeholder fails to resolve or the rendered
/// text is not a valid message.
pub fn render_message(
    alert: &Alert,
    event: &serde_json::Value,
) -> Result<WebhookMessage, AlertError> {
    let rendered = render_template(&alert.slack_message, event)?;
    Ok(serde_json::from_str(&rendered)?)
}

/// Substitutes `{{ .path.to.field }}` placeholders with values looked up in
/// the event payload. Scalars render bare; anything else renders as JSON.
fn render_template(template: &str, event: &serde_json::Value) -> Result<String, AlertError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(AlertError::UnterminatedPlaceholder)?;
        let path = after_open[..end].trim().trim_start_matches('.');
        out.push_str(&resolve_path(event, path)?);
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve_path(event: &serde_json::Value, path: &str) -> Result<String, AlertError> {
    let mut current = event;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = current.get(segment).ok_or_else(|| AlertError::UnknownField {
            path: path.to_owned(),
        })?;
    }
    Ok(match current {
        serde_json::Value::String(value) => value.clone(),
        other => other.to_string(),
    })
}
