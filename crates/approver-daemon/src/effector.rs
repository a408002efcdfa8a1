//! Fan-out of a computed result back to the forge.
//!
//! The three writes (commit status, review requests, label replacement)
//! run in parallel and all complete before the first observed error is
//! propagated. A pending result with disqualified reviewers additionally
//! rewrites the bot's disqualification comment.

use approver_core::approval::{EvaluationResult, IGNORED_REVIEWERS_COMMENT_TITLE};
use approver_core::forge::{ForgeClient, ForgeError};
use approver_core::webhook::Event;
use tracing::trace;

/// Publishes `result` to the pull request the event refers to.
///
/// # Errors
///
/// Returns the first failed write; the sibling writes still run to
/// completion.
pub async fn apply(
    forge: &dyn ForgeClient,
    event: &Event,
    result: &EvaluationResult,
) -> Result<(), ForgeError> {
    let repository = event.repository();
    let pull_request = event.pull_request();
    let owner = repository.owner_login();
    let repo = repository.name.as_str();
    let number = pull_request.number;
    let sha = sha_from_statuses_url(&pull_request.statuses_url);

    trace!(status = %result.status(), "reporting commit status");
    trace!(reviews = ?result.reviews_to_request(), "requesting reviews");
    trace!(labels = ?result.final_labels(), "updating labels");

    let description = result.description();
    let (status_written, reviews_requested, labels_replaced) = tokio::join!(
        forge.report_status(owner, repo, sha, result.status().as_str(), &description),
        forge.request_reviews(owner, repo, number, result.reviews_to_request()),
        forge.replace_labels(owner, repo, number, result.final_labels()),
    );
    status_written?;
    reviews_requested?;
    labels_replaced?;

    if result.pending_reviews_waiting() && !result.ignored_reviewers().is_empty() {
        rewrite_ignored_reviewers_comment(forge, owner, repo, number, result.ignored_reviewers())
            .await?;
    }

    Ok(())
}

/// Deletes every previous disqualification comment and posts a fresh one.
async fn rewrite_ignored_reviewers_comment(
    forge: &dyn ForgeClient,
    owner: &str,
    repo: &str,
    number: u64,
    reviewers: &[String],
) -> Result<(), ForgeError> {
    let comments = forge.list_issue_comments(owner, repo, number).await?;
    for comment in comments {
        if comment.body.contains(IGNORED_REVIEWERS_COMMENT_TITLE) {
            forge.delete_issue_comment(owner, repo, comment.id).await?;
        }
    }

    let mut body = IGNORED_REVIEWERS_COMMENT_TITLE.to_owned();
    for reviewer in reviewers {
        body.push_str(&format!("- @{reviewer}\n"));
    }
    forge.create_issue_comment(owner, repo, number, &body).await
}

/// The statuses URL embeds the head SHA as its final path segment.
fn sha_from_statuses_url(statuses_url: &str) -> &str {
    statuses_url.rsplit('/').next().unwrap_or(statuses_url)
}
