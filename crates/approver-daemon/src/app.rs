//! Process-scoped application context.
//!
//! Everything read from the environment is resolved once at startup into an
//! [`App`] value that the dispatcher shares immutably across requests.
//! There is no package-level mutable state.

use std::sync::Arc;

use anyhow::Context;
use approver_core::forge::ForgeClient;
use approver_core::forge::github::GitHubClient;
use approver_core::github::AppTokenProvider;
use approver_core::secrets::{self, SecretStore};
use approver_core::webhook::SignatureVerifier;
use tracing::warn;

const DEFAULT_APP_NAME: &str = "github-team-approver";
const DEFAULT_GITHUB_BASE_URL: &str = "https://api.github.com/";

const ENV_APP_NAME: &str = "APP_NAME";
const ENV_GITHUB_APP_ID: &str = "GITHUB_APP_ID";
const ENV_GITHUB_APP_INSTALLATION_ID: &str = "GITHUB_APP_INSTALLATION_ID";
const ENV_GITHUB_APP_PRIVATE_KEY_PATH: &str = "GITHUB_APP_PRIVATE_KEY_PATH";
const ENV_GITHUB_APP_WEBHOOK_SECRET_TOKEN_PATH: &str = "GITHUB_APP_WEBHOOK_SECRET_TOKEN_PATH";
const ENV_GITHUB_BASE_URL: &str = "GITHUB_BASE_URL";
const ENV_GITHUB_STATUS_NAME: &str = "GITHUB_STATUS_NAME";
const ENV_IGNORED_REPOSITORIES: &str = "IGNORED_REPOSITORIES";
const ENV_SECRET_STORE_TYPE: &str = "SECRET_STORE_TYPE";
const ENV_SLACK_WEBHOOK_SECRET: &str = "SLACK_WEBHOOK_SECRET";
const ENV_USE_CACHING_TRANSPORT: &str = "USE_CACHING_TRANSPORT";

/// Read-only context shared by every request handler.
pub struct App {
    /// Service name attached to log records.
    pub app_name: String,
    /// `owner/repo` values whose events are dropped with 204.
    pub ignored_repositories: Vec<String>,
    /// Chat webhook URL for merge alerts; empty disables the alert path.
    pub slack_webhook_url: String,
    /// Webhook delivery verifier.
    pub verifier: SignatureVerifier,
    /// Forge client used for every read and write.
    pub forge: Arc<dyn ForgeClient>,
    /// Plain HTTP client for chat webhook delivery.
    pub http: reqwest::Client,
}

impl App {
    /// Builds the context for tests and embedders: given forge, no webhook
    /// secret, nothing ignored, alerts disabled.
    #[must_use]
    pub fn new(forge: Arc<dyn ForgeClient>) -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_owned(),
            ignored_repositories: Vec::new(),
            slack_webhook_url: String::new(),
            verifier: SignatureVerifier::new(None),
            forge,
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the webhook secret.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Vec<u8>) -> Self {
        self.verifier = SignatureVerifier::new(Some(secret));
        self
    }

    /// Replaces the ignored-repository list.
    #[must_use]
    pub fn with_ignored_repositories(mut self, repositories: Vec<String>) -> Self {
        self.ignored_repositories = repositories;
        self
    }

    /// Replaces the chat webhook URL.
    #[must_use]
    pub fn with_slack_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.slack_webhook_url = url.into();
        self
    }

    /// Builds the context from the process environment.
    ///
    /// Missing optional material (webhook secret, App credentials, chat
    /// webhook) degrades with a warning; only an unusable forge base URL is
    /// fatal.
    ///
    /// # Errors
    ///
    /// Returns an error when the forge client cannot be constructed.
    pub fn from_env() -> anyhow::Result<Self> {
        let store = secrets::store_for_type(
            &std::env::var(ENV_SECRET_STORE_TYPE).unwrap_or_default(),
        );

        let app_name = match std::env::var(ENV_APP_NAME) {
            Ok(name) if !name.is_empty() => name,
            _ => DEFAULT_APP_NAME.to_owned(),
        };

        let webhook_secret = match store.get(ENV_GITHUB_APP_WEBHOOK_SECRET_TOKEN_PATH) {
            Ok(secret) => Some(secret),
            Err(err) => {
                warn!(
                    error = %err,
                    "event signatures won't be checked: failed to read webhook secret token"
                );
                None
            }
        };

        let ignored_repositories = std::env::var(ENV_IGNORED_REPOSITORIES)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|repo| !repo.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let slack_webhook_url = match store.get(ENV_SLACK_WEBHOOK_SECRET) {
            Ok(url) => String::from_utf8_lossy(&url).trim().to_owned(),
            Err(err) => {
                warn!(error = %err, "merge alerts disabled: failed to read chat webhook URL");
                String::new()
            }
        };

        let forge = Arc::new(build_forge_client(store.as_ref())?);

        Ok(Self {
            app_name,
            ignored_repositories,
            slack_webhook_url,
            verifier: SignatureVerifier::new(webhook_secret),
            forge,
            http: reqwest::Client::new(),
        })
    }
}

fn build_forge_client(store: &dyn SecretStore) -> anyhow::Result<GitHubClient> {
    let mut base_url =
        std::env::var(ENV_GITHUB_BASE_URL).unwrap_or_else(|_| DEFAULT_GITHUB_BASE_URL.to_owned());
    if !base_url.ends_with('/') {
        base_url.push('/');
    }

    let mut client = GitHubClient::new(base_url.clone())
        .context("failed to construct forge client")?
        .with_status_context(std::env::var(ENV_GITHUB_STATUS_NAME).unwrap_or_default());

    if std::env::var(ENV_USE_CACHING_TRANSPORT)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
    {
        client = client.with_caching();
    }

    if let Some(provider) = app_token_provider(store, &base_url) {
        client = client.with_token_provider(Arc::new(provider));
    }

    Ok(client)
}

/// Assembles the App identity triple. Any missing or unusable piece leaves
/// the transport unauthenticated with a warning; event handling is never
/// aborted for this reason alone.
fn app_token_provider(store: &dyn SecretStore, base_url: &str) -> Option<AppTokenProvider> {
    let app_id = match std::env::var(ENV_GITHUB_APP_ID) {
        Ok(id) if id.parse::<u64>().is_ok() => id,
        _ => {
            warn!("proceeding unauthenticated: failed to parse application id");
            return None;
        }
    };
    let installation_id = match std::env::var(ENV_GITHUB_APP_INSTALLATION_ID) {
        Ok(id) if id.parse::<u64>().is_ok() => id,
        _ => {
            warn!("proceeding unauthenticated: failed to parse installation id");
            return None;
        }
    };
    let private_key = match store.get(ENV_GITHUB_APP_PRIVATE_KEY_PATH) {
        Ok(key) => key,
        Err(err) => {
            warn!(error = %err, "proceeding unauthenticated: failed to read private key");
            return None;
        }
    };

    match AppTokenProvider::new(base_url, app_id, installation_id, &private_key) {
        Ok(provider) => Some(provider),
        Err(err) => {
            warn!(error = %err, "proceeding unauthenticated: failed to create token provider");
            None
        }
    }
}
