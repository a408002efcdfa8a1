//! Provider-agnostic forge data shapes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// An organisation team.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    /// Numeric team identifier.
    pub id: u64,
    /// URL-safe team slug.
    pub slug: String,
    /// Display name.
    pub name: String,
}

/// A team member or event actor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    /// Account login.
    pub login: String,
}

/// State of a pull-request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReviewState {
    /// The reviewer approved the change.
    #[serde(rename = "APPROVED")]
    Approved,
    /// The reviewer left comments without a verdict.
    #[serde(rename = "COMMENTED")]
    Commented,
    /// The reviewer requested changes.
    #[serde(rename = "CHANGES_REQUESTED")]
    ChangesRequested,
    /// The review was dismissed.
    #[serde(rename = "DISMISSED")]
    Dismissed,
    /// The review has not been submitted yet.
    #[serde(rename = "PENDING")]
    Pending,
    /// Any state this service does not recognise.
    #[serde(other)]
    Other,
}

/// A submitted pull-request review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Review {
    /// The reviewing user; absent for deleted accounts.
    pub user: Option<User>,
    /// Review verdict.
    pub state: ReviewState,
    /// Submission timestamp, used to order a reviewer's verdicts.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Login of the reviewing user, or the empty string for deleted
    /// accounts.
    #[must_use]
    pub fn login(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.login.as_str())
    }
}

/// A file changed by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitFile {
    /// Contents-API URL of the file; its path segment carries the
    /// repo-relative location used for directory matching.
    pub contents_url: String,
}

/// A commit on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryCommit {
    /// Account that created the commit, when known.
    pub committer: Option<User>,
    /// Commit payload.
    pub commit: CommitDetail,
}

/// The commit payload carried by [`RepositoryCommit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitDetail {
    /// Full commit message, including trailers.
    #[serde(default)]
    pub message: String,
}

/// An issue timeline event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueEvent {
    /// Event type, e.g. `reopened`.
    pub event: String,
    /// Account that performed the event.
    pub actor: Option<User>,
}

/// A comment on the pull request's issue thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueComment {
    /// Comment identifier.
    pub id: u64,
    /// Comment body.
    #[serde(default)]
    pub body: String,
}
