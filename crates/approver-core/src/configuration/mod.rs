//! Per-repository review policy.
//!
//! The policy lives at a fixed path inside the repository being reviewed
//! and is fetched fresh for every event. Only the fields consumed by the
//! engine are modelled; unknown YAML keys are ignored so repositories can
//! carry annotations this service does not understand.

use serde::Deserialize;
use thiserror::Error;

/// Repository-relative path of the policy file.
pub const CONFIGURATION_FILE_PATH: &str = ".github/GITHUB_TEAM_APPROVER.yaml";

/// Errors raised while reading a policy file.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The file exists but is not valid YAML for the policy schema.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Root of the policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Configuration {
    /// Ordered rule groups; groups are selected by target branch.
    #[serde(default)]
    pub pull_request_approval_rules: Vec<ApprovalRuleGroup>,
}

impl Configuration {
    /// Parses a policy document from raw YAML bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the document does not deserialize into the
    /// policy schema.
    pub fn parse(raw: &[u8]) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_slice(raw)?)
    }
}

/// A group of rules and alerts scoped to a set of target branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApprovalRuleGroup {
    /// Branches this group applies to; empty means every branch.
    #[serde(default)]
    pub target_branches: Vec<String>,
    /// Approval rules, evaluated in order.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Merge alerts, consulted only on merged-to-target events.
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// How many of a rule's teams must approve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ApprovalMode {
    /// One approval from any listed team fulfils the rule.
    #[serde(rename = "require_any", alias = "REQUIRE_ANY")]
    RequireAny,
    /// Every listed team must approve.
    #[default]
    #[serde(rename = "require_all", alias = "REQUIRE_ALL")]
    RequireAll,
}

/// A single approval rule.
///
/// All matching fields are optional; a rule constrains only the fields it
/// sets, and a rule that sets none of them never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Rule {
    /// Case-insensitive pattern matched against the pull request body.
    #[serde(default)]
    pub regex: String,
    /// Case-insensitive pattern matched against each of the PR's labels.
    #[serde(default)]
    pub regex_label: String,
    /// Path selectors matched against the changed-file set. A selector
    /// starting with `/` anchors at the repository root; otherwise it is a
    /// substring match.
    #[serde(default)]
    pub directories: Vec<String>,
    /// Teams whose approval the rule requires, as id, slug or name,
    /// optionally prefixed with `{org}/`.
    #[serde(default)]
    pub approving_team_handles: Vec<String>,
    /// Bot-owned labels applied when the rule matches (stored without the
    /// reserved prefix).
    #[serde(default)]
    pub labels: Vec<String>,
    /// Whether one team or all teams must approve.
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// Forces the overall result to success when the rule matches.
    #[serde(default)]
    pub force_approval: bool,
    /// Removes PR contributors from the eligible-reviewer set.
    #[serde(default)]
    pub ignore_contributor_approval: bool,
}

impl Rule {
    /// Returns true when the rule sets none of its matching fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regex.is_empty() && self.regex_label.is_empty() && self.directories.is_empty()
    }
}

/// A merge alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Alert {
    /// Case-insensitive pattern matched against the pull request body.
    #[serde(default)]
    pub regex: String,
    /// Message template rendered over the event payload.
    #[serde(default)]
    pub slack_message: String,
    /// Legacy per-alert webhook reference; retained so old policy files
    /// still deserialize. The delivery path uses the globally configured
    /// webhook URL instead.
    #[serde(default)]
    pub slack_webhook_secret: String,
}
