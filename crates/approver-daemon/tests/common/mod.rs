//! In-memory recording forge shared by the dispatcher tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use approver_core::configuration::Configuration;
use approver_core::forge::types::{
    CommitDetail, CommitFile, IssueComment, IssueEvent, RepositoryCommit, Review, ReviewState,
    Team, User,
};
use approver_core::forge::{ForgeClient, ForgeError};
use async_trait::async_trait;

/// A write the daemon performed against the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Status {
        sha: String,
        status: String,
        description: String,
    },
    ReviewRequest {
        team_slugs: Vec<String>,
    },
    Labels {
        labels: Vec<String>,
    },
    CommentCreated {
        body: String,
    },
    CommentDeleted {
        id: u64,
    },
}

/// Recording fake forge with canned read data.
#[derive(Default)]
pub struct FakeForge {
    pub configuration: Option<String>,
    pub teams: Vec<Team>,
    pub members: HashMap<String, Vec<User>>,
    pub reviews: Vec<Review>,
    pub commits: Vec<RepositoryCommit>,
    pub labels: Vec<String>,
    pub files: Vec<CommitFile>,
    pub comments: Mutex<Vec<IssueComment>>,
    pub writes: Mutex<Vec<WriteCall>>,
    pub calls: AtomicUsize,
}

impl FakeForge {
    pub fn recorded_writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, call: WriteCall) {
        self.writes.lock().unwrap().push(call);
    }
}

pub fn user(login: &str) -> User {
    User {
        login: login.to_owned(),
    }
}

pub fn team(id: u64, slug: &str, name: &str) -> Team {
    Team {
        id,
        slug: slug.to_owned(),
        name: name.to_owned(),
    }
}

pub fn approved_review(login: &str) -> Review {
    Review {
        user: Some(user(login)),
        state: ReviewState::Approved,
        submitted_at: None,
    }
}

pub fn commit_by(login: &str) -> RepositoryCommit {
    RepositoryCommit {
        committer: Some(user(login)),
        commit: CommitDetail {
            message: "change".to_owned(),
        },
    }
}

#[async_trait]
impl ForgeClient for FakeForge {
    async fn get_configuration(&self, _: &str, _: &str) -> Result<Configuration, ForgeError> {
        self.touch();
        match &self.configuration {
            Some(raw) => Configuration::parse(raw.as_bytes())
                .map_err(|err| ForgeError::Parse(err.to_string())),
            None => Err(ForgeError::NoConfigurationFile),
        }
    }

    async fn get_pull_request_reviews(
        &self,
        _: &str,
        _: &str,
        _: u64,
    ) -> Result<Vec<Review>, ForgeError> {
        self.touch();
        Ok(self.reviews.clone())
    }

    async fn get_pull_request_commit_files(
        &self,
        _: &str,
        _: &str,
        _: u64,
    ) -> Result<Vec<CommitFile>, ForgeError> {
        self.touch();
        Ok(self.files.clone())
    }

    async fn get_pr_commits(
        &self,
        _: &str,
        _: &str,
        _: u64,
    ) -> Result<Vec<RepositoryCommit>, ForgeError> {
        self.touch();
        Ok(self.commits.clone())
    }

    async fn get_pr_issue_events(
        &self,
        _: &str,
        _: &str,
        _: u64,
    ) -> Result<Vec<IssueEvent>, ForgeError> {
        self.touch();
        Ok(Vec::new())
    }

    async fn get_teams(&self, _: &str) -> Result<Vec<Team>, ForgeError> {
        self.touch();
        Ok(self.teams.clone())
    }

    async fn get_team_members(
        &self,
        teams: &[Team],
        org: &str,
        team_name: &str,
    ) -> Result<Vec<User>, ForgeError> {
        self.touch();
        if !teams.iter().any(|team| team.name == team_name) {
            return Err(ForgeError::UnknownTeam {
                name: team_name.to_owned(),
                org: org.to_owned(),
            });
        }
        Ok(self.members.get(team_name).cloned().unwrap_or_default())
    }

    async fn get_labels(&self, _: &str, _: &str, _: u64) -> Result<Vec<String>, ForgeError> {
        self.touch();
        Ok(self.labels.clone())
    }

    async fn report_status(
        &self,
        _: &str,
        _: &str,
        sha: &str,
        status: &str,
        description: &str,
    ) -> Result<(), ForgeError> {
        self.touch();
        self.record(WriteCall::Status {
            sha: sha.to_owned(),
            status: status.to_owned(),
            description: description.to_owned(),
        });
        Ok(())
    }

    async fn request_reviews(
        &self,
        _: &str,
        _: &str,
        _: u64,
        team_slugs: &[String],
    ) -> Result<(), ForgeError> {
        self.touch();
        if team_slugs.is_empty() {
            return Ok(());
        }
        self.record(WriteCall::ReviewRequest {
            team_slugs: team_slugs.to_vec(),
        });
        Ok(())
    }

    async fn replace_labels(
        &self,
        _: &str,
        _: &str,
        _: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        self.touch();
        if labels.is_empty() {
            return Ok(());
        }
        self.record(WriteCall::Labels {
            labels: labels.to_vec(),
        });
        Ok(())
    }

    async fn list_issue_comments(
        &self,
        _: &str,
        _: &str,
        _: u64,
    ) -> Result<Vec<IssueComment>, ForgeError> {
        self.touch();
        Ok(self.comments.lock().unwrap().clone())
    }

    async fn create_issue_comment(
        &self,
        _: &str,
        _: &str,
        _: u64,
        body: &str,
    ) -> Result<(), ForgeError> {
        self.touch();
        self.record(WriteCall::CommentCreated {
            body: body.to_owned(),
        });
        Ok(())
    }

    async fn delete_issue_comment(&self, _: &str, _: &str, comment_id: u64) -> Result<(), ForgeError> {
        self.touch();
        self.comments
            .lock()
            .unwrap()
            .retain(|comment| comment.id != comment_id);
        self.record(WriteCall::CommentDeleted { id: comment_id });
        Ok(())
    }
}
