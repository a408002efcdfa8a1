//! GitHub implementation of the forge client contract.
//!
//! Every request runs under a 15 s deadline and paginated reads walk all
//! pages at 100 items each. Responses with status >= 300 surface the body
//! text; the policy-file download maps a 404 onto
//! [`ForgeError::NoConfigurationFile`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use super::cache::EtagCache;
use super::types::{CommitFile, IssueComment, IssueEvent, RepositoryCommit, Review, Team, User};
use super::{ForgeClient, ForgeError};
use crate::configuration::{Configuration, CONFIGURATION_FILE_PATH};
use crate::github::InstallationTokenProvider;

/// Items requested per page on every paginated read.
const PER_PAGE: usize = 100;
/// Deadline applied to each individual forge request.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(15);

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "team-approver";

/// GitHub REST client.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    status_context: String,
    token_provider: Option<Arc<dyn InstallationTokenProvider>>,
    cache: Option<EtagCache>,
}

impl GitHubClient {
    /// Creates a client against `base_url`, which must end with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Configuration`] when the base URL is empty or
    /// lacks the trailing slash.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ForgeError> {
        let base_url = base_url.into();
        if base_url.is_empty() || !base_url.ends_with('/') {
            return Err(ForgeError::Configuration(format!(
                "base URL {base_url:?} must be non-empty and end with '/'"
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            status_context: String::new(),
            token_provider: None,
            cache: None,
        })
    }

    /// Sets the `context` reported on commit statuses.
    #[must_use]
    pub fn with_status_context(mut self, context: impl Into<String>) -> Self {
        self.status_context = context.into();
        self
    }

    /// Authenticates the transport as an App installation.
    #[must_use]
    pub fn with_token_provider(mut self, provider: Arc<dyn InstallationTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Enables the always-stale revalidating response cache.
    #[must_use]
    pub fn with_caching(mut self) -> Self {
        self.cache = Some(EtagCache::new());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let Some(provider) = &self.token_provider else {
            return builder;
        };
        match provider.installation_token().await {
            Ok(token) => builder.bearer_auth(token.expose_secret()),
            Err(err) => {
                // Degraded transport still serves public repositories.
                warn!(error = %err, "proceeding unauthenticated: could not mint installation token");
                builder
            }
        }
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ForgeError> {
        let builder = self.authorize(builder).await;
        tokio::time::timeout(OPERATION_TIMEOUT, builder.send())
            .await
            .map_err(|_| ForgeError::Timeout(url.to_owned()))?
            .map_err(ForgeError::from)
    }

    /// Issues a GET and returns the response body, revalidating through the
    /// cache when one is configured.
    async fn get_bytes(&self, url: &str, accept: &str) -> Result<Vec<u8>, ForgeError> {
        let mut builder = self
            .http
            .get(url)
            .header("Accept", accept)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(cache) = &self.cache {
            if let Some(validator) = cache.validator(url) {
                builder = builder.header(IF_NONE_MATCH, validator);
            }
        }

        let response = self.send(builder, url).await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if let Some(body) = self.cache.as_ref().and_then(|cache| cache.replay(url)) {
                return Ok(body);
            }
            return Err(ForgeError::Transport(format!(
                "received 304 for {url} without a cached body"
            )));
        }

        if status.as_u16() >= 300 {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_owned());
            return Err(ForgeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(ForgeError::from)?.to_vec();

        if let (Some(cache), Some(etag)) = (&self.cache, etag) {
            cache.store(url, &etag, &body);
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ForgeError> {
        let body = self.get_bytes(url, ACCEPT_JSON).await?;
        serde_json::from_slice(&body).map_err(ForgeError::from)
    }

    /// Accumulates every page of a list endpoint. `path` must not carry a
    /// query string.
    async fn get_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ForgeError> {
        let mut items: Vec<T> = Vec::new();
        let mut page = 1usize;
        loop {
            let url = self.url(&format!("{path}?per_page={PER_PAGE}&page={page}"));
            let batch: Vec<T> = self.get_json(&url).await?;
            let short_page = batch.len() < PER_PAGE;
            items.extend(batch);
            if short_page {
                return Ok(items);
            }
            page += 1;
        }
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ForgeError> {
        let url = self.url(path);
        let mut builder = self
            .http
            .request(method, &url)
            .header("Accept", ACCEPT_JSON)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(payload) = body {
            builder = builder.json(&payload);
        }
        self.send(builder, &url).await
    }

    async fn expect_success(response: reqwest::Response, what: &str) -> Result<(), ForgeError> {
        let status = response.status();
        if status.as_u16() < 300 {
            return Ok(());
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_owned());
        Err(ForgeError::Api {
            status: status.as_u16(),
            message: format!("{what}: {message}"),
        })
    }
}

#[async_trait]
impl ForgeClient for GitHubClient {
    async fn get_configuration(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Configuration, ForgeError> {
        let url = self.url(&format!(
            "repos/{owner}/{repo}/contents/{CONFIGURATION_FILE_PATH}"
        ));
        let raw = match self.get_bytes(&url, ACCEPT_RAW).await {
            Ok(raw) => raw,
            Err(ForgeError::Api { status: 404, .. }) => {
                return Err(ForgeError::NoConfigurationFile)
            }
            Err(err) => return Err(err),
        };
        Configuration::parse(&raw).map_err(|err| ForgeError::Parse(err.to_string()))
    }

    async fn get_pull_request_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<Review>, ForgeError> {
        self.get_paginated(&format!("repos/{owner}/{repo}/pulls/{pr}/reviews"))
            .await
    }

    async fn get_pull_request_commit_files(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<CommitFile>, ForgeError> {
        self.get_paginated(&format!("repos/{owner}/{repo}/pulls/{pr}/files"))
            .await
    }

    async fn get_pr_commits(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<RepositoryCommit>, ForgeError> {
        self.get_paginated(&format!("repos/{owner}/{repo}/pulls/{pr}/commits"))
            .await
    }

    async fn get_pr_issue_events(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<IssueEvent>, ForgeError> {
        self.get_paginated(&format!("repos/{owner}/{repo}/issues/{pr}/events"))
            .await
    }

    async fn get_teams(&self, org: &str) -> Result<Vec<Team>, ForgeError> {
        self.get_paginated(&format!("orgs/{org}/teams")).await
    }

    async fn get_team_members(
        &self,
        teams: &[Team],
        org: &str,
        team_name: &str,
    ) -> Result<Vec<User>, ForgeError> {
        let team = teams
            .iter()
            .find(|team| team.name == team_name)
            .ok_or_else(|| ForgeError::UnknownTeam {
                name: team_name.to_owned(),
                org: org.to_owned(),
            })?;
        self.get_paginated(&format!("orgs/{org}/teams/{}/members", team.slug))
            .await
    }

    async fn get_labels(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<String>, ForgeError> {
        let labels: Vec<GithubLabel> = self
            .get_paginated(&format!("repos/{owner}/{repo}/issues/{pr}/labels"))
            .await?;
        Ok(labels.into_iter().map(|label| label.name).collect())
    }

    async fn report_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &str,
        description: &str,
    ) -> Result<(), ForgeError> {
        let response = self
            .send_json(
                Method::POST,
                &format!("repos/{owner}/{repo}/statuses/{sha}"),
                Some(json!({
                    "state": status,
                    "context": self.status_context,
                    "description": description,
                })),
            )
            .await?;
        Self::expect_success(response, "error reporting status").await
    }

    async fn request_reviews(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
        team_slugs: &[String],
    ) -> Result<(), ForgeError> {
        if team_slugs.is_empty() {
            return Ok(());
        }
        let response = self
            .send_json(
                Method::POST,
                &format!("repos/{owner}/{repo}/pulls/{pr}/requested_reviewers"),
                Some(json!({ "team_reviewers": team_slugs })),
            )
            .await?;
        Self::expect_success(response, "error requesting reviews").await
    }

    async fn replace_labels(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        if labels.is_empty() {
            return Ok(());
        }
        let response = self
            .send_json(
                Method::PUT,
                &format!("repos/{owner}/{repo}/issues/{pr}/labels"),
                Some(json!({ "labels": labels })),
            )
            .await?;
        Self::expect_success(response, "error updating labels").await
    }

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<IssueComment>, ForgeError> {
        self.get_paginated(&format!("repos/{owner}/{repo}/issues/{pr}/comments"))
            .await
    }

    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
        body: &str,
    ) -> Result<(), ForgeError> {
        let response = self
            .send_json(
                Method::POST,
                &format!("repos/{owner}/{repo}/issues/{pr}/comments"),
                Some(json!({ "body": body })),
            )
            .await?;
        Self::expect_success(response, "error creating comment").await
    }

    async fn delete_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<(), ForgeError> {
        let response = self
            .send_json(
                Method::DELETE,
                &format!("repos/{owner}/{repo}/issues/comments/{comment_id}"),
                None,
            )
            .await?;
        // Someone else already deleted it; the desired state holds.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response, "error deleting comment").await
    }
}

#[derive(Debug, Deserialize)]
struct GithubLabel {
    name: String,
}
