//! GitHub client tests against an in-process fake forge.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use serde::Deserialize;
use serde_json::json;

use approver_core::forge::github::GitHubClient;
use approver_core::forge::{ForgeClient, ForgeError};

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default)]
    per_page: usize,
}

fn default_page() -> usize {
    1
}

#[derive(Default)]
struct FakeForgeState {
    teams_hits: AtomicUsize,
}

async fn reviews(Query(query): Query<PageQuery>) -> impl IntoResponse {
    // 150 approvals split over two pages.
    let total = 150;
    let start = (query.page - 1) * query.per_page;
    let end = total.min(start + query.per_page);
    let page: Vec<_> = (start..end)
        .map(|i| {
            json!({
                "user": {"login": format!("reviewer-{i}")},
                "state": "APPROVED",
                "submitted_at": "2024-05-01T10:00:00Z"
            })
        })
        .collect();
    axum::Json(page)
}

async fn configuration() -> impl IntoResponse {
    (
        StatusCode::OK,
        "pull_request_approval_rules:\n- rules:\n  - regex: foo\n",
    )
}

async fn teams(
    State(state): State<Arc<FakeForgeState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.teams_hits.fetch_add(1, Ordering::SeqCst);
    if headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|v| v == "\"teams-v1\"")
    {
        return (StatusCode::NOT_MODIFIED, HeaderMap::new(), String::new());
    }
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ETAG, "\"teams-v1\"".parse().unwrap());
    (
        StatusCode::OK,
        response_headers,
        json!([{"id": 1, "slug": "cab-foo", "name": "CAB - Foo"}]).to_string(),
    )
}

async fn labels() -> impl IntoResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        "labels are broken right now",
    )
}

async fn delete_comment() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "comment is gone")
}

async fn start_fake_forge() -> (SocketAddr, Arc<FakeForgeState>) {
    let state = Arc::new(FakeForgeState::default());
    let router = Router::new()
        .route("/repos/acme/svc/pulls/1/reviews", get(reviews))
        .route(
            "/repos/acme/svc/contents/.github/GITHUB_TEAM_APPROVER.yaml",
            get(configuration),
        )
        .route("/orgs/acme/teams", get(teams))
        .route("/repos/acme/svc/issues/1/labels", get(labels))
        .route(
            "/repos/acme/svc/issues/comments/{id}",
            delete(delete_comment),
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

fn client(addr: SocketAddr) -> GitHubClient {
    GitHubClient::new(format!("http://{addr}/")).unwrap()
}

#[tokio::test]
async fn paginated_reads_accumulate_every_page() {
    let (addr, _state) = start_fake_forge().await;
    let reviews = client(addr)
        .get_pull_request_reviews("acme", "svc", 1)
        .await
        .unwrap();
    assert_eq!(reviews.len(), 150);
    assert_eq!(reviews[0].login(), "reviewer-0");
    assert_eq!(reviews[149].login(), "reviewer-149");
}

#[tokio::test]
async fn missing_configuration_file_is_distinguished() {
    let (addr, _state) = start_fake_forge().await;
    // A repo without the policy file path registered yields 404.
    let err = client(addr)
        .get_configuration("acme", "other")
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::NoConfigurationFile));
}

#[tokio::test]
async fn present_configuration_file_is_parsed() {
    let (addr, _state) = start_fake_forge().await;
    let cfg = client(addr)
        .get_configuration("acme", "svc")
        .await
        .unwrap();
    assert_eq!(cfg.pull_request_approval_rules.len(), 1);
}

#[tokio::test]
async fn error_statuses_surface_the_body_text() {
    let (addr, _state) = start_fake_forge().await;
    let err = client(addr)
        .get_labels("acme", "svc", 1)
        .await
        .unwrap_err();
    match err {
        ForgeError::Api { status, message } => {
            assert_eq!(status, 422);
            assert!(message.contains("labels are broken right now"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn caching_transport_revalidates_and_replays_on_304() {
    let (addr, state) = start_fake_forge().await;
    let client = GitHubClient::new(format!("http://{addr}/"))
        .unwrap()
        .with_caching();

    let first = client.get_teams("acme").await.unwrap();
    // Every entry is treated as stale: the second call still hits the
    // server and is served from the cache on 304.
    let second = client.get_teams("acme").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].name, "CAB - Foo");
    assert_eq!(state.teams_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn deleting_an_already_deleted_comment_succeeds() {
    let (addr, _state) = start_fake_forge().await;
    client(addr)
        .delete_issue_comment("acme", "svc", 99)
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_team_name_fails_member_lookup() {
    let (addr, _state) = start_fake_forge().await;
    let teams = client(addr).get_teams("acme").await.unwrap();
    let err = client(addr)
        .get_team_members(&teams, "acme", "Ghost Team")
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::UnknownTeam { .. }));
}

#[tokio::test]
async fn base_url_must_end_with_a_slash() {
    assert!(matches!(
        GitHubClient::new("http://forge.local"),
        Err(ForgeError::Configuration(_))
    ));
}
