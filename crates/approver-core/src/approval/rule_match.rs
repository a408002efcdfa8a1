//! Pure rule matching over a pull request's body, labels and changed files.

use regex::{Regex, RegexBuilder};

use super::ApprovalError;
use crate::configuration::Rule;
use crate::forge::types::CommitFile;

/// The pull-request facts a rule is matched against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RuleMatchInput<'a> {
    pub body: &'a str,
    pub labels: &'a [String],
    pub changed_files: &'a [CommitFile],
}

/// Decides whether `rule` applies to the pull request.
///
/// Only the fields the rule sets act as constraints, and all set fields
/// must match. A rule that sets none of them never matches.
pub(crate) fn rule_matches(rule: &Rule, input: RuleMatchInput<'_>) -> Result<bool, ApprovalError> {
    let body_match = if rule.regex.is_empty() {
        false
    } else {
        case_insensitive(&rule.regex)?.is_match(input.body)
    };

    let label_match = if rule.regex_label.is_empty() {
        false
    } else {
        let pattern = case_insensitive(&rule.regex_label)?;
        input.labels.iter().any(|label| pattern.is_match(label))
    };

    let directories_match = if rule.directories.is_empty() {
        false
    } else {
        any_directory_changed(&rule.directories, input.changed_files)?
    };

    if !body_match && !label_match && !directories_match {
        return Ok(false);
    }
    if !rule.regex.is_empty() && !body_match {
        return Ok(false);
    }
    if !rule.regex_label.is_empty() && !label_match {
        return Ok(false);
    }
    if !rule.directories.is_empty() && !directories_match {
        return Ok(false);
    }
    Ok(true)
}

fn case_insensitive(pattern: &str) -> Result<Regex, ApprovalError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ApprovalError::BadRegex {
            pattern: pattern.to_owned(),
            source,
        })
}

fn any_directory_changed(
    selectors: &[String],
    changed_files: &[CommitFile],
) -> Result<bool, ApprovalError> {
    for selector in selectors {
        if directory_changed(selector, changed_files)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether any changed file falls under `selector`. A selector starting
/// with `/` anchors at the repository root, otherwise any path containing
/// it matches; a trailing `/` is insignificant.
fn directory_changed(selector: &str, changed_files: &[CommitFile]) -> Result<bool, ApprovalError> {
    let trimmed = selector.trim_end_matches('/');
    let (anchored, needle) = match trimmed.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    for file in changed_files {
        let relative_dir = contents_url_to_relative_dir(&file.contents_url)?;
        let hit = if anchored {
            relative_dir.starts_with(needle)
        } else {
            relative_dir.contains(needle)
        };
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Extracts the repo-relative directory from a contents-API URL by
/// stripping the `repos/{owner}/{repo}` lead-in and the trailing filename.
pub(crate) fn contents_url_to_relative_dir(contents_url: &str) -> Result<String, ApprovalError> {
    let malformed = |reason: &str| ApprovalError::MalformedContentsUrl {
        url: contents_url.to_owned(),
        reason: reason.to_owned(),
    };

    let after_scheme = contents_url
        .split_once("://")
        .ok_or_else(|| malformed("missing scheme"))?
        .1;
    let path = after_scheme
        .split_once('/')
        .map_or("", |(_, path)| path);
    let path = path.split_once('?').map_or(path, |(path, _)| path);

    let parts: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() < 3 {
        return Err(malformed("expected at least 3 path segments: repos/<org>/<repo>"));
    }
    if parts[0] != "repos" {
        return Err(malformed("expected path to start with 'repos'"));
    }
    if parts.len() <= 4 {
        // File at the repository root.
        return Ok(String::new());
    }
    Ok(parts[3..parts.len() - 1].join("/"))
}
