//! Per-evaluation accumulator and final-status decision.

use std::collections::BTreeSet;

use super::matched_rule::MatchedRule;
use super::result::{EvaluationResult, Status};
use crate::forge::types::{Review, ReviewState, Team};

const DESCRIPTION_NO_RULES_MATCHED: &str = "The PR's body doesn't meet the requirements.";
const DESCRIPTION_FORCIBLY_APPROVED: &str = "Forcibly approved.";
const DESCRIPTION_NO_REVIEWS_REQUESTED: &str =
    "No teams have been identified as having to be requested for a review.";
const DESCRIPTION_INVALID_HANDLES_PREFIX: &str =
    "Invalid config: no teams could be found for the following handles:\n";
const DESCRIPTION_APPROVED_PREFIX: &str = "Approved by:\n";
const DESCRIPTION_PENDING_PREFIX: &str = "Needs approval from:\n";

/// Mutable evaluation state, discarded once the result is computed.
#[derive(Debug, Default)]
pub(crate) struct State {
    labels: Vec<String>,
    matched_rules: Vec<MatchedRule>,
    approving_reviewers: BTreeSet<String>,
    ignored_reviewers: BTreeSet<String>,
    invalid_team_handles: BTreeSet<String>,
}

impl State {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records every user that currently has an APPROVED review.
    pub(crate) fn set_approving_reviewers(&mut self, reviews: &[Review]) {
        self.approving_reviewers = reviews
            .iter()
            .filter(|review| review.state == ReviewState::Approved)
            .map(|review| review.login().to_owned())
            .filter(|login| !login.is_empty())
            .collect();
    }

    /// Adds a label, keeping insertion order and dropping duplicates.
    pub(crate) fn add_label(&mut self, label: &str) {
        if !self.labels.iter().any(|existing| existing == label) {
            self.labels.push(label.to_owned());
        }
    }

    pub(crate) fn add_invalid_team_handle(&mut self, handle: &str) {
        self.invalid_team_handles.insert(handle.to_owned());
    }

    pub(crate) fn add_matched_rule(&mut self, matched: MatchedRule) {
        self.matched_rules.push(matched);
    }

    /// Merges disqualified reviewers, keeping only those that actually
    /// approved: a contributor who never reviewed is never named.
    pub(crate) fn add_ignored_reviewers(&mut self, ignored: &BTreeSet<String>) {
        for login in ignored.intersection(&self.approving_reviewers) {
            self.ignored_reviewers.insert(login.clone());
        }
    }

    /// Applies the final-status decision table and consumes the state.
    pub(crate) fn into_result(self, teams: &[Team]) -> EvaluationResult {
        let force_approval = self
            .matched_rules
            .iter()
            .any(|matched| matched.rule.force_approval);
        let all_fulfilled = self.matched_rules.iter().all(MatchedRule::fulfilled);

        let approving: BTreeSet<String> = self
            .matched_rules
            .iter()
            .flat_map(MatchedRule::approving_team_names)
            .collect();
        let mut pending: BTreeSet<String> = self
            .matched_rules
            .iter()
            .flat_map(MatchedRule::pending_team_names)
            .collect();

        let (status, description) = if self.matched_rules.is_empty() {
            (Status::Pending, DESCRIPTION_NO_RULES_MATCHED.to_owned())
        } else if !self.invalid_team_handles.is_empty() {
            let handles: Vec<&str> = self
                .invalid_team_handles
                .iter()
                .map(String::as_str)
                .collect();
            (
                Status::Error,
                format!("{DESCRIPTION_INVALID_HANDLES_PREFIX}{}", handles.join("\n")),
            )
        } else if force_approval {
            (Status::Success, DESCRIPTION_FORCIBLY_APPROVED.to_owned())
        } else if !all_fulfilled && !pending.is_empty() {
            let names: Vec<&str> = pending.iter().map(String::as_str).collect();
            (
                Status::Pending,
                format!("{DESCRIPTION_PENDING_PREFIX}{}", names.join("\n")),
            )
        } else if pending.is_empty() && approving.is_empty() {
            (Status::Success, DESCRIPTION_NO_REVIEWS_REQUESTED.to_owned())
        } else {
            // Approved; avoid requesting further reviews.
            pending.clear();
            let names: Vec<&str> = approving.iter().map(String::as_str).collect();
            (
                Status::Success,
                format!("{DESCRIPTION_APPROVED_PREFIX}{}", names.join("\n")),
            )
        };

        let reviews_to_request = match status {
            // An invalid policy suppresses review requests entirely.
            Status::Error => Vec::new(),
            _ => reviews_to_request(teams, &pending),
        };

        EvaluationResult {
            status,
            description,
            final_labels: self.labels,
            reviews_to_request,
            ignored_reviewers: self.ignored_reviewers.into_iter().collect(),
        }
    }
}

/// Builds the "no rules apply to this branch" short-circuit result.
pub(crate) fn no_rules_for_target_branch() -> EvaluationResult {
    EvaluationResult {
        status: Status::Success,
        description: "No rules are defined for the target branch.".to_owned(),
        final_labels: Vec::new(),
        reviews_to_request: Vec::new(),
        ignored_reviewers: Vec::new(),
    }
}

/// Maps pending handles onto team slugs. A pending team no longer present
/// in the organisation simply yields no slug.
fn reviews_to_request(teams: &[Team], pending: &BTreeSet<String>) -> Vec<String> {
    let mut slugs = Vec::new();
    for pending_team in pending {
        for team in teams {
            if *pending_team == team.name && !slugs.contains(&team.slug) {
                slugs.push(team.slug.clone());
            }
        }
    }
    slugs
}
