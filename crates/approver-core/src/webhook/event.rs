//! Decoded webhook events.
//!
//! Only two delivery types are honoured: `pull_request` and
//! `pull_request_review`. Both carry the same pull-request and repository
//! records, so they form a closed sum with shared accessors; the decoder is
//! selected from the event-type header.

use serde::Deserialize;
use thiserror::Error;

use crate::forge::types::User;

/// Event-type header value for pull-request events.
pub const EVENT_TYPE_PULL_REQUEST: &str = "pull_request";
/// Event-type header value for review events.
pub const EVENT_TYPE_PULL_REQUEST_REVIEW: &str = "pull_request_review";

const ACTION_CLOSED: &str = "closed";

/// Event decoding failures.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The delivery type is not one this service handles.
    #[error("ignoring event: unsupported type {0:?}")]
    UnsupportedType(String),

    /// The body is not valid JSON for the event shape.
    #[error("unmarshal request body: {0}")]
    Json(#[from] serde_json::Error),
}

/// A label as carried on the event payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelPayload {
    /// Label name.
    pub name: String,
}

/// Base-branch reference on the event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BranchPayload {
    /// Branch name.
    #[serde(rename = "ref", default)]
    pub reference: String,
}

/// The pull-request record carried by both event types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestPayload {
    /// Pull request number.
    #[serde(default)]
    pub number: u64,
    /// Pull request body markdown.
    #[serde(default)]
    pub body: Option<String>,
    /// Whether the pull request has been merged.
    #[serde(default)]
    pub merged: bool,
    /// Target branch.
    #[serde(default)]
    pub base: BranchPayload,
    /// Labels currently on the pull request.
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
    /// Statuses URL; its final segment is the head commit SHA.
    #[serde(default)]
    pub statuses_url: String,
    /// Pull request author.
    #[serde(default)]
    pub user: Option<User>,
}

impl PullRequestPayload {
    /// Names of the labels on the pull request.
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|label| label.name.clone()).collect()
    }
}

/// The repository record carried by both event types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoryPayload {
    /// Repository name.
    #[serde(default)]
    pub name: String,
    /// `owner/name` form used by the ignore list.
    #[serde(default)]
    pub full_name: String,
    /// Repository owner.
    #[serde(default)]
    pub owner: Option<User>,
}

impl RepositoryPayload {
    /// Login of the repository owner, or the empty string when absent.
    #[must_use]
    pub fn owner_login(&self) -> &str {
        self.owner.as_ref().map_or("", |owner| owner.login.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct EventBody {
    #[serde(default)]
    action: String,
    #[serde(default)]
    pull_request: PullRequestPayload,
    #[serde(default)]
    repository: RepositoryPayload,
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A `pull_request` delivery.
    PullRequest(PullRequestEvent),
    /// A `pull_request_review` delivery.
    PullRequestReview(PullRequestReviewEvent),
}

/// A `pull_request` delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PullRequestEvent(EventBody);

/// A `pull_request_review` delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PullRequestReviewEvent(EventBody);

impl Event {
    /// Decodes `body` according to the event-type header value.
    ///
    /// # Errors
    ///
    /// Returns [`EventDecodeError::UnsupportedType`] for any type other
    /// than `pull_request`/`pull_request_review`, or
    /// [`EventDecodeError::Json`] when the body does not parse.
    pub fn decode(event_type: &str, body: &[u8]) -> Result<Self, EventDecodeError> {
        match event_type {
            EVENT_TYPE_PULL_REQUEST => Ok(Self::PullRequest(serde_json::from_slice(body)?)),
            EVENT_TYPE_PULL_REQUEST_REVIEW => {
                Ok(Self::PullRequestReview(serde_json::from_slice(body)?))
            }
            other => Err(EventDecodeError::UnsupportedType(other.to_owned())),
        }
    }

    fn body(&self) -> &EventBody {
        match self {
            Self::PullRequest(PullRequestEvent(body))
            | Self::PullRequestReview(PullRequestReviewEvent(body)) => body,
        }
    }

    /// The delivery's action string.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.body().action
    }

    /// The pull-request record.
    #[must_use]
    pub fn pull_request(&self) -> &PullRequestPayload {
        &self.body().pull_request
    }

    /// The repository record.
    #[must_use]
    pub fn repository(&self) -> &RepositoryPayload {
        &self.body().repository
    }

    /// Whether this delivery reports a merge into the target branch.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.body().action == ACTION_CLOSED && self.body().pull_request.merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PR_EVENT: &str = r#"{
        "action": "opened",
        "pull_request": {
            "number": 17,
            "body": "please review",
            "merged": false,
            "base": {"ref": "master"},
            "labels": [{"name": "size/s"}, {"name": "github-team-approver/stale"}],
            "statuses_url": "https://api.github.com/repos/acme/svc/statuses/abc123",
            "user": {"login": "dev"}
        },
        "repository": {
            "name": "svc",
            "full_name": "acme/svc",
            "owner": {"login": "acme"}
        }
    }"#;

    #[test]
    fn decodes_pull_request_event() {
        let event = Event::decode(EVENT_TYPE_PULL_REQUEST, PR_EVENT.as_bytes()).unwrap();
        assert_eq!(event.action(), "opened");
        assert_eq!(event.pull_request().number, 17);
        assert_eq!(event.pull_request().base.reference, "master");
        assert_eq!(
            event.pull_request().label_names(),
            vec!["size/s", "github-team-approver/stale"]
        );
        assert_eq!(event.repository().full_name, "acme/svc");
        assert_eq!(event.repository().owner_login(), "acme");
        assert!(!event.is_merge());
    }

    #[test]
    fn decodes_review_event_with_same_accessors() {
        let event = Event::decode(EVENT_TYPE_PULL_REQUEST_REVIEW, PR_EVENT.as_bytes()).unwrap();
        assert!(matches!(event, Event::PullRequestReview(_)));
        assert_eq!(event.pull_request().number, 17);
    }

    #[test]
    fn merge_requires_closed_action_and_merged_flag() {
        let closed_merged = PR_EVENT
            .replace(r#""action": "opened""#, r#""action": "closed""#)
            .replace(r#""merged": false"#, r#""merged": true"#);
        let event = Event::decode(EVENT_TYPE_PULL_REQUEST, closed_merged.as_bytes()).unwrap();
        assert!(event.is_merge());

        let closed_unmerged =
            PR_EVENT.replace(r#""action": "opened""#, r#""action": "closed""#);
        let event = Event::decode(EVENT_TYPE_PULL_REQUEST, closed_unmerged.as_bytes()).unwrap();
        assert!(!event.is_merge());
    }

    #[test]
    fn unsupported_type_is_rejected() {
        assert!(matches!(
            Event::decode("ping", b"{}"),
            Err(EventDecodeError::UnsupportedType(_))
        ));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            Event::decode(EVENT_TYPE_PULL_REQUEST, b"not json"),
            Err(EventDecodeError::Json(_))
        ));
    }
}
