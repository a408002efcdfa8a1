//! Forge client contract.
//!
//! The engine talks to the hosting service exclusively through
//! [`ForgeClient`]. Every operation runs under a per-call deadline and the
//! paginated reads return the fully accumulated list; a single failed page
//! fails the whole call.

use async_trait::async_trait;
use thiserror::Error;

use crate::configuration::Configuration;

pub mod cache;
pub mod github;
pub mod types;

pub use types::{
    CommitFile, IssueComment, IssueEvent, RepositoryCommit, Review, ReviewState, Team, User,
};

/// Errors emitted by forge clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ForgeError {
    /// The repository carries no policy file. Distinguished from transport
    /// errors so the dispatcher can ignore the event.
    #[error("no configuration file exists in the source repository")]
    NoConfigurationFile,

    /// A team name could not be resolved against the fetched team list.
    #[error("could not find team {name:?} in organisation {org:?}")]
    UnknownTeam {
        /// Requested team name.
        name: String,
        /// Organisation the lookup ran against.
        org: String,
    },

    /// Invalid client configuration.
    #[error("forge configuration error: {0}")]
    Configuration(String),

    /// Request transport failed.
    #[error("forge transport error: {0}")]
    Transport(String),

    /// The call exceeded its deadline.
    #[error("forge call timed out: {0}")]
    Timeout(String),

    /// The forge answered with a non-success status.
    #[error("forge API error (status: {status}): {message}")]
    Api {
        /// HTTP status code returned by the forge.
        status: u16,
        /// Response body text.
        message: String,
    },

    /// Response payload parse failed.
    #[error("forge parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ForgeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// The read and write operations the engine depends on.
///
/// Reads walk every page (100 items per page) before returning. Writes are
/// idempotent: re-running the same event reproduces the same calls, and the
/// empty-input writes are no-ops.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Downloads and parses the repository's policy file.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::NoConfigurationFile`] when the file is absent,
    /// or another variant for transport and parse failures.
    async fn get_configuration(&self, owner: &str, repo: &str)
        -> Result<Configuration, ForgeError>;

    /// All reviews ever submitted on the pull request, any state.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn get_pull_request_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<Review>, ForgeError>;

    /// Files changed by the pull request.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn get_pull_request_commit_files(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<CommitFile>, ForgeError>;

    /// Commits on the pull request.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn get_pr_commits(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<RepositoryCommit>, ForgeError>;

    /// Issue timeline events for the pull request, used to discover
    /// re-openers.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn get_pr_issue_events(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<IssueEvent>, ForgeError>;

    /// Teams of the organisation.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn get_teams(&self, org: &str) -> Result<Vec<Team>, ForgeError>;

    /// Members of the named team, resolved against an already-fetched team
    /// list.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::UnknownTeam`] when the name is not in `teams`,
    /// or another variant when a member page cannot be listed.
    async fn get_team_members(
        &self,
        teams: &[Team],
        org: &str,
        team_name: &str,
    ) -> Result<Vec<User>, ForgeError>;

    /// Names of the labels currently on the pull request.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn get_labels(&self, owner: &str, repo: &str, pr: u64)
        -> Result<Vec<String>, ForgeError>;

    /// Creates a commit status for `sha`.
    ///
    /// # Errors
    ///
    /// Returns an error when status publication fails.
    async fn report_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &str,
        description: &str,
    ) -> Result<(), ForgeError>;

    /// Requests reviews from the given team slugs. No-op on empty input.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    async fn request_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
        team_slugs: &[String],
    ) -> Result<(), ForgeError>;

    /// Replaces the pull request's labels. No-op on empty input.
    ///
    /// # Errors
    ///
    /// Returns an error when the replacement fails.
    async fn replace_labels(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
        labels: &[String],
    ) -> Result<(), ForgeError>;

    /// Comments on the pull request's issue thread.
    ///
    /// # Errors
    ///
    /// Returns an error when any page cannot be listed.
    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<IssueComment>, ForgeError>;

    /// Posts a comment on the pull request's issue thread.
    ///
    /// # Errors
    ///
    /// Returns an error when comment publication fails.
    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
        body: &str,
    ) -> Result<(), ForgeError>;

    /// Deletes a comment. A missing comment counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error when the deletion fails for any reason other than
    /// the comment already being gone.
    async fn delete_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<(), ForgeError>;
}
