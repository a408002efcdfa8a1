//! The outcome of evaluating a pull request against its policy.

/// Commit-status descriptions are bounded to this many characters.
const DESCRIPTION_MAX_LENGTH: usize = 140;
const TRUNCATION_SUFFIX: &str = "...";

/// Final commit status of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Approvals are still outstanding.
    Pending,
    /// The policy is satisfied.
    Success,
    /// The policy itself is invalid.
    Error,
}

impl Status {
    /// Wire representation used for commit statuses and response headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the effector needs to write back to the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub(crate) status: Status,
    pub(crate) description: String,
    pub(crate) final_labels: Vec<String>,
    pub(crate) reviews_to_request: Vec<String>,
    pub(crate) ignored_reviewers: Vec<String>,
}

impl EvaluationResult {
    /// The final commit status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// The status description, truncated to the commit-status bound.
    #[must_use]
    pub fn description(&self) -> String {
        truncate(&self.description, DESCRIPTION_MAX_LENGTH)
    }

    /// The full label set to put on the pull request.
    #[must_use]
    pub fn final_labels(&self) -> &[String] {
        &self.final_labels
    }

    /// Slugs of the teams to request reviews from.
    #[must_use]
    pub fn reviews_to_request(&self) -> &[String] {
        &self.reviews_to_request
    }

    /// Reviewers whose approvals were discounted because they contributed
    /// to the pull request.
    #[must_use]
    pub fn ignored_reviewers(&self) -> &[String] {
        &self.ignored_reviewers
    }

    /// Whether the pull request is still waiting on reviews.
    #[must_use]
    pub fn pending_reviews_waiting(&self) -> bool {
        self.status == Status::Pending
    }
}

/// Bounds `v` to `n` characters, replacing the overrun with `...`. A budget
/// that cannot fit the suffix yields the raw prefix.
fn truncate(v: &str, n: usize) -> String {
    if n <= TRUNCATION_SUFFIX.len() {
        return v.chars().take(n).collect();
    }
    if v.chars().count() <= n {
        return v.to_owned();
    }
    let prefix: String = v.chars().take(n - TRUNCATION_SUFFIX.len()).collect();
    format!("{prefix}{TRUNCATION_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_identity_within_budget() {
        assert_eq!(truncate("short", 140), "short");
        assert_eq!(truncate("", 140), "");
        let exactly = "x".repeat(140);
        assert_eq!(truncate(&exactly, 140), exactly);
    }

    #[test]
    fn truncate_shortens_and_appends_suffix() {
        let long = "y".repeat(141);
        let out = truncate(&long, 140);
        assert_eq!(out.chars().count(), 140);
        assert!(out.ends_with("..."));
        assert!(out.starts_with("yyy"));
    }

    #[test]
    fn truncate_tiny_budget_returns_raw_prefix() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("abcdef", 2), "ab");
        assert_eq!(truncate("abcdef", 0), "");
    }

    #[test]
    fn truncate_respects_multibyte_boundaries() {
        let long = "ü".repeat(200);
        let out = truncate(&long, 140);
        assert_eq!(out.chars().count(), 140);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(Status::Pending.as_str(), "pending");
        assert_eq!(Status::Success.as_str(), "success");
        assert_eq!(Status::Error.as_str(), "error");
    }

    #[test]
    fn description_accessor_applies_the_bound() {
        let result = EvaluationResult {
            status: Status::Pending,
            description: "d".repeat(400),
            final_labels: vec![],
            reviews_to_request: vec![],
            ignored_reviewers: vec![],
        };
        assert_eq!(result.description().chars().count(), 140);
        assert!(result.description().ends_with("..."));
        assert!(result.pending_reviews_waiting());
    }
}
