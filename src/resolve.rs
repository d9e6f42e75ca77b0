use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, BitbucketClient, Repository, Session};

/// Page size used when pulling each workspace's repository list.
const RESOLVE_PAGE_SIZE: u32 = 50;

/// One hit of a cross-workspace repository search.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RepositoryMatch {
    pub workspace: String,
    pub workspace_name: String,
    pub repository: Repository,
}

/// Case-insensitive equality or containment against slug and display name.
fn matches_query(repository: &Repository, query: &str) -> bool {
    let query = query.to_lowercase();
    let slug = repository.slug.to_lowercase();
    let name = repository.name.to_lowercase();
    slug == query || name == query || slug.contains(&query) || name.contains(&query)
}

/// Search every accessible workspace for repositories matching `name`.
///
/// The workspace enumeration is required; a workspace whose repository
/// list cannot be fetched is skipped with a warning and the remaining
/// workspaces still contribute. Zero matches overall is `NotFound`;
/// multiple matches are returned as-is for the caller to disambiguate.
#[instrument(skip(client, session))]
pub async fn resolve_repository(
    client: &BitbucketClient,
    session: &Session,
    name: &str,
) -> Result<Vec<RepositoryMatch>, ApiError> {
    let workspaces = client.list_workspaces(session).await?;
    let workspace_count = workspaces.len();

    let mut matches = Vec::new();
    for workspace in workspaces {
        let repositories = match client
            .list_workspace_repositories(session, &workspace.slug, RESOLVE_PAGE_SIZE)
            .await
        {
            Ok(repositories) => repositories,
            Err(err) => {
                warn!(workspace = %workspace.slug, error = %err, "repository listing failed, skipping workspace");
                continue;
            }
        };

        for repository in repositories {
            if matches_query(&repository, name) {
                matches.push(RepositoryMatch {
                    workspace: workspace.slug.clone(),
                    workspace_name: workspace.name.clone(),
                    repository,
                });
            }
        }
    }

    if matches.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No repository matching '{name}' found across {workspace_count} workspaces"
        )));
    }

    debug!(count = matches.len(), "repository name resolved");
    Ok(matches)
}

/// Resolve `name` to exactly one repository, for callers that cannot work
/// with a candidate list.
pub async fn resolve_single(
    client: &BitbucketClient,
    session: &Session,
    name: &str,
) -> Result<RepositoryMatch, ApiError> {
    let mut matches = resolve_repository(client, session, name).await?;
    if matches.len() > 1 {
        let candidates = matches
            .iter()
            .map(|found| format!("{}/{}", found.workspace, found.repository.slug))
            .collect();
        return Err(ApiError::AmbiguousRepository {
            name: name.to_string(),
            candidates,
        });
    }
    Ok(matches.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{test_client, user_body};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn authenticated(server: &MockServer) -> (BitbucketClient, Session) {
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
            .mount(server)
            .await;
        let client = test_client(&server.uri());
        let session = client.ensure_session().await.unwrap();
        (client, session)
    }

    fn values(body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "values": body }))
    }

    async fn mount_three_workspaces(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/workspaces"))
            .respond_with(values(serde_json::json!([
                {"slug": "w1", "name": "First"},
                {"slug": "w2", "name": "Second"},
                {"slug": "w3", "name": "Third"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/w1"))
            .respond_with(values(serde_json::json!([
                {"slug": "unrelated", "name": "Unrelated"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/w2"))
            .respond_with(values(serde_json::json!([
                {"slug": "foo-bar", "name": "Foo Bar"},
                {"slug": "other", "name": "Other"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/w3"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workspace on fire"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_partial_workspace_failure_still_resolves() {
        let server = MockServer::start().await;
        let (client, session) = authenticated(&server).await;
        mount_three_workspaces(&server).await;

        let matches = resolve_repository(&client, &session, "foo").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].workspace, "w2");
        assert_eq!(matches[0].workspace_name, "Second");
        assert_eq!(matches[0].repository.slug, "foo-bar");
    }

    #[tokio::test]
    async fn test_zero_matches_is_not_found() {
        let server = MockServer::start().await;
        let (client, session) = authenticated(&server).await;
        mount_three_workspaces(&server).await;

        let err = resolve_repository(&client, &session, "nonexistent")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_single_rejects_ambiguous_names() {
        let server = MockServer::start().await;
        let (client, session) = authenticated(&server).await;

        Mock::given(method("GET"))
            .and(path("/workspaces"))
            .respond_with(values(serde_json::json!([{"slug": "w1", "name": "First"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/w1"))
            .respond_with(values(serde_json::json!([
                {"slug": "api-gateway", "name": "API Gateway"},
                {"slug": "gateway-docs", "name": "Gateway Docs"}
            ])))
            .mount(&server)
            .await;

        let err = resolve_single(&client, &session, "gateway").await.unwrap_err();
        match err {
            ApiError::AmbiguousRepository { name, candidates } => {
                assert_eq!(name, "gateway");
                assert_eq!(candidates, ["w1/api-gateway", "w1/gateway-docs"]);
            }
            other => panic!("expected AmbiguousRepository, got {other:?}"),
        }
    }

    #[test]
    fn test_match_predicate() {
        let repo: Repository =
            serde_json::from_str(r#"{"slug": "foo-bar", "name": "Foo Bar"}"#).unwrap();
        assert!(matches_query(&repo, "foo"));
        assert!(matches_query(&repo, "FOO-BAR"));
        assert!(matches_query(&repo, "Bar"));
        assert!(!matches_query(&repo, "baz"));
    }
}
