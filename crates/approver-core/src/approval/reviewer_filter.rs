//! Partitioning team members into eligible and ignored reviewers.
//!
//! When a rule ignores contributor approvals, any member who authored or
//! co-authored a commit on the pull request (or, when issue events are
//! available, re-opened it) is removed from the eligible set.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::forge::types::{IssueEvent, RepositoryCommit, User};

const ISSUE_EVENT_REOPENED: &str = "reopened";

/// Matches `Co-authored-by` trailers with a noreply address and captures
/// the local part, which is either `login` or `<numeric id>+login`.
static CO_AUTHOR_TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Co-authored-by: .+? <([\w+-]+)@users\.noreply\.github\.com>")
        .expect("co-author trailer pattern is valid")
});

/// Splits `members` into `(eligible, ignored)` reviewer sets.
///
/// With `ignore_contributor_approval` unset every member is eligible. The
/// two sets are always disjoint.
pub(crate) fn partition(
    members: &[User],
    commits: &[RepositoryCommit],
    issue_events: Option<&[IssueEvent]>,
    ignore_contributor_approval: bool,
) -> (BTreeSet<String>, BTreeSet<String>) {
    if !ignore_contributor_approval {
        let eligible = members.iter().map(|member| member.login.clone()).collect();
        return (eligible, BTreeSet::new());
    }

    let mut contributors: BTreeSet<String> = BTreeSet::new();
    for commit in commits {
        if let Some(committer) = &commit.committer {
            contributors.insert(committer.login.clone());
        }
        for co_author in find_co_authors(&commit.commit.message) {
            contributors.insert(co_author);
        }
    }
    if let Some(events) = issue_events {
        for event in events {
            if event.event == ISSUE_EVENT_REOPENED {
                if let Some(actor) = &event.actor {
                    contributors.insert(actor.login.clone());
                }
            }
        }
    }

    let mut eligible = BTreeSet::new();
    let mut ignored = BTreeSet::new();
    for member in members {
        if contributors.contains(&member.login) {
            ignored.insert(member.login.clone());
        } else {
            eligible.insert(member.login.clone());
        }
    }
    (eligible, ignored)
}

/// Extracts co-author logins from a commit message. The modern noreply form
/// is `<id>+<login>@…`, the legacy form carries the bare login.
fn find_co_authors(message: &str) -> Vec<String> {
    CO_AUTHOR_TRAILER
        .captures_iter(message)
        .map(|captures| {
            let local_part = &captures[1];
            match local_part.split_once('+') {
                Some((_, login)) => login.to_owned(),
                None => local_part.to_owned(),
            }
        })
        .collect()
}
