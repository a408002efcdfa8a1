//! Per-rule approval bookkeeping.

use std::collections::BTreeMap;

use crate::configuration::{ApprovalMode, Rule};

/// Approval counts per team handle. Only handles with at least one approval
/// are recorded.
pub type TeamApprovals = BTreeMap<String, u32>;

/// A policy rule that matched the pull request, together with the approvals
/// tallied for its teams.
#[derive(Debug, Clone)]
pub struct MatchedRule {
    pub(crate) rule: Rule,
    approvals: TeamApprovals,
}

impl MatchedRule {
    /// Binds an empty tally to a matched rule.
    #[must_use]
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            approvals: TeamApprovals::new(),
        }
    }

    /// Records the approval count for a handle. Zero counts are not stored.
    pub fn record_approval(&mut self, team_handle: &str, count: u32) {
        if count >= 1 {
            self.approvals.insert(team_handle.to_owned(), count);
        }
    }

    /// Handles with at least one approval, sorted ascending.
    #[must_use]
    pub fn approving_team_names(&self) -> Vec<String> {
        self.approvals
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Handles still waiting on an approval, sorted ascending. A
    /// require-any rule with at least one approval has nothing pending.
    #[must_use]
    pub fn pending_team_names(&self) -> Vec<String> {
        if self.rule.approval_mode == ApprovalMode::RequireAny && self.any_team_approved() {
            return Vec::new();
        }
        let mut pending: Vec<String> = self
            .rule
            .approving_team_handles
            .iter()
            .filter(|handle| self.approvals.get(*handle).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();
        pending.sort();
        pending
    }

    /// Whether the rule's approval condition is satisfied.
    #[must_use]
    pub fn fulfilled(&self) -> bool {
        if self.rule.force_approval {
            return true;
        }
        match self.rule.approval_mode {
            ApprovalMode::RequireAny => self.any_team_approved(),
            ApprovalMode::RequireAll => self.all_teams_approved(),
        }
    }

    fn any_team_approved(&self) -> bool {
        self.approvals.values().sum::<u32>() >= 1
    }

    fn all_teams_approved(&self) -> bool {
        self.rule
            .approving_team_handles
            .iter()
            .all(|handle| self.approvals.get(handle).copied().unwrap_or(0) >= 1)
    }
}
