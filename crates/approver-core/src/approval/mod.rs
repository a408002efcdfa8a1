//! The approval engine.
//!
//! [`Approval::compute_approval_status`] orchestrates one evaluation:
//! load the policy, select the rules that apply to the target branch,
//! match each one against the pull request, tally per-team approvals with
//! contributor disqualification, and fold everything into an
//! [`EvaluationResult`] via the final-status decision table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{trace, warn};

use crate::configuration::{Configuration, Rule};
use crate::forge::types::{IssueEvent, RepositoryCommit, Review, ReviewState, Team};
use crate::forge::{ForgeClient, ForgeError};

mod matched_rule;
mod result;
mod reviewer_filter;
mod rule_match;
mod state;


pub use matched_rule::{MatchedRule, TeamApprovals};
pub use result::{EvaluationResult, Status};

use rule_match::RuleMatchInput;
use state::State;

/// Prefix reserved for labels owned by this service. Initial labels
/// carrying it are dropped and reconstituted from matched rules.
pub const LABEL_PREFIX: &str = "github-team-approver/";

/// Title line of the disqualified-reviewers comment. Any existing comment
/// containing it is deleted before a fresh one is posted.
pub const IGNORED_REVIEWERS_COMMENT_TITLE: &str =
    "Following reviewers have been ignored as they are also authors in the PR:\n";

/// Errors raised while evaluating a pull request.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// A forge operation failed.
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// A policy pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?} in configuration: {source}")]
    BadRegex {
        /// The offending pattern.
        pattern: String,
        /// Compilation failure.
        source: regex::Error,
    },

    /// A changed file's contents URL does not have the expected structure.
    #[error("invalid contents url {url:?}: {reason}")]
    MalformedContentsUrl {
        /// The offending URL.
        url: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// The per-event pull-request context the engine evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Repository owner login.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
    /// Target branch of the pull request.
    pub target_branch: String,
    /// Pull request body markdown.
    pub body: String,
    /// Labels on the pull request when the event fired.
    pub initial_labels: Vec<String>,
    /// Pull request author login, when known.
    pub author: Option<String>,
}

type ContributorInputs = (Vec<RepositoryCommit>, Option<Vec<IssueEvent>>);

/// The approval engine. Stateless between evaluations.
pub struct Approval {
    client: Arc<dyn ForgeClient>,
}

impl Approval {
    /// Creates an engine over the given forge client.
    #[must_use]
    pub fn new(client: Arc<dyn ForgeClient>) -> Self {
        Self { client }
    }

    /// Evaluates the pull request against its repository's policy.
    ///
    /// # Errors
    ///
    /// Propagates [`ForgeError::NoConfigurationFile`] untouched so the
    /// dispatcher can ignore the event, and any other forge, pattern or
    /// contents-URL failure.
    pub async fn compute_approval_status(
        &self,
        pr: &PullRequest,
    ) -> Result<EvaluationResult, ApprovalError> {
        let cfg = self.client.get_configuration(&pr.owner, &pr.repo).await?;

        let rules = applicable_rules(&cfg, &pr.target_branch);
        if rules.is_empty() {
            trace!(target_branch = %pr.target_branch, "no rules apply to target branch");
            return Ok(state::no_rules_for_target_branch());
        }
        trace!(
            rules = rules.len(),
            target_branch = %pr.target_branch,
            "rules apply to target branch"
        );

        let teams = self.client.get_teams(&pr.owner).await?;
        let reviews = self
            .client
            .get_pull_request_reviews(&pr.owner, &pr.repo, pr.number)
            .await?;

        let mut state = State::new();
        state.set_approving_reviewers(&reviews);

        // Seed with every label this service does not own; bot labels are
        // reconstituted from the rules that match.
        for label in &pr.initial_labels {
            if !label.starts_with(LABEL_PREFIX) {
                state.add_label(label);
            }
        }

        // The matcher is pure; fetch its inputs once, and only when some
        // applicable rule needs them.
        let pr_labels = if rules.iter().any(|rule| !rule.regex_label.is_empty()) {
            self.client
                .get_labels(&pr.owner, &pr.repo, pr.number)
                .await?
        } else {
            Vec::new()
        };
        let changed_files = if rules.iter().any(|rule| !rule.directories.is_empty()) {
            self.client
                .get_pull_request_commit_files(&pr.owner, &pr.repo, pr.number)
                .await?
        } else {
            Vec::new()
        };
        let (commits, issue_events) =
            if rules.iter().any(|rule| rule.ignore_contributor_approval) {
                self.contributor_inputs(pr).await?
            } else {
                (Vec::new(), None)
            };

        for rule in rules {
            let matched_inputs = RuleMatchInput {
                body: &pr.body,
                labels: &pr_labels,
                changed_files: &changed_files,
            };
            if !rule_match::rule_matches(&rule, matched_inputs)? {
                continue;
            }
            trace!(pr = pr.number, ?rule, "PR matches rule");

            for label in &rule.labels {
                if !label.is_empty() {
                    state.add_label(&format!("{LABEL_PREFIX}{label}"));
                }
            }

            let mut matched = MatchedRule::new(rule.clone());
            for handle in &rule.approving_team_handles {
                let Some(team_name) = team_name_from_handle(&teams, &pr.owner, handle) else {
                    warn!(handle = %handle, "no team could be found for handle");
                    state.add_invalid_team_handle(handle);
                    continue;
                };

                let members = self
                    .client
                    .get_team_members(&teams, &pr.owner, &team_name)
                    .await?;

                let (eligible, ignored) = reviewer_filter::partition(
                    &members,
                    &commits,
                    issue_events.as_deref(),
                    rule.ignore_contributor_approval,
                );

                let count = count_approvals_for_team(&reviews, &eligible);
                matched.record_approval(handle, count);
                state.add_ignored_reviewers(&ignored);
            }
            state.add_matched_rule(matched);
        }

        Ok(state.into_result(&teams))
    }

    /// Fetches the commit list and, best-effort, the issue events used for
    /// contributor disqualification.
    async fn contributor_inputs(
        &self,
        pr: &PullRequest,
    ) -> Result<ContributorInputs, ApprovalError> {
        let commits = self
            .client
            .get_pr_commits(&pr.owner, &pr.repo, pr.number)
            .await?;
        // Re-opener discovery is an optional input: forges without the
        // endpoint still get committer/co-author filtering.
        let events = match self
            .client
            .get_pr_issue_events(&pr.owner, &pr.repo, pr.number)
            .await
        {
            Ok(events) => Some(events),
            Err(err) => {
                warn!(error = %err, "could not list issue events; skipping re-opener check");
                None
            }
        };
        Ok((commits, events))
    }
}

/// Concatenates the rules of every group whose target branches are empty or
/// contain `target_branch`. Duplicates across groups are kept in order.
fn applicable_rules(cfg: &Configuration, target_branch: &str) -> Vec<Rule> {
    let mut rules = Vec::new();
    for group in &cfg.pull_request_approval_rules {
        if group.target_branches.is_empty()
            || group.target_branches.iter().any(|branch| branch == target_branch)
        {
            rules.extend(group.rules.iter().cloned());
        }
    }
    rules
}

/// Resolves a team handle (id, slug or name, optionally `{org}/`-prefixed)
/// to the team's name. `None` marks the handle invalid.
fn team_name_from_handle(teams: &[Team], org: &str, handle: &str) -> Option<String> {
    let org_prefix = format!("{org}/");
    let handle = handle.strip_prefix(&org_prefix).unwrap_or(handle);
    teams
        .iter()
        .find(|team| team.id.to_string() == handle || team.slug == handle || team.name == handle)
        .map(|team| team.name.clone())
}

/// Counts how many eligible members' latest non-comment review approves
/// the pull request.
fn count_approvals_for_team(reviews: &[Review], eligible: &BTreeSet<String>) -> u32 {
    let mut verdicts: Vec<&Review> = reviews
        .iter()
        .filter(|review| {
            eligible.contains(review.login()) && review.state != ReviewState::Commented
        })
        .collect();
    verdicts.sort_by_key(|review| review.submitted_at);

    let mut latest_by_login: BTreeMap<&str, &Review> = BTreeMap::new();
    for review in verdicts {
        latest_by_login.insert(review.login(), review);
    }

    u32::try_from(
        latest_by_login
            .values()
            .filter(|review| review.state == ReviewState::Approved)
            .count(),
    )
    .unwrap_or(u32::MAX)
}
