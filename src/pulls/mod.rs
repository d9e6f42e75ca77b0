pub mod types;

pub use types::{DiffSummary, PullRequestDetail, PullRequestSummary};

use tracing::{instrument, warn};

use crate::api::{ApiError, BitbucketClient, Session};
use types::{ActivityEntry, CommentEntry, Reviewer};

/// List pull requests in `state`, projected to flat summaries.
pub async fn list_summaries(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    state: &str,
    page_size: u32,
) -> Result<Vec<PullRequestSummary>, ApiError> {
    let prs = client
        .list_pull_requests(session, workspace, repo_slug, state, page_size)
        .await?;
    Ok(prs.iter().map(PullRequestSummary::from).collect())
}

/// List pull requests in `state` whose title contains `query`
/// (case-insensitive).
pub async fn search_by_title(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    query: &str,
    state: &str,
    page_size: u32,
) -> Result<Vec<PullRequestSummary>, ApiError> {
    let needle = query.to_lowercase();
    let summaries = list_summaries(client, session, workspace, repo_slug, state, page_size).await?;
    Ok(summaries
        .into_iter()
        .filter(|pr| pr.title.to_lowercase().contains(&needle))
        .collect())
}

/// Diffstat of one pull request, grouped by change type. The diffstat
/// fetch is required here; it is the direct target of the call.
pub async fn diff_summary(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    pr_id: u64,
) -> Result<DiffSummary, ApiError> {
    let entries = client
        .pull_request_diffstat(session, workspace, repo_slug, pr_id)
        .await?;
    Ok(DiffSummary::from_entries(&entries))
}

/// Collapse an optional sub-fetch to its empty default, keeping the
/// failure visible in the log.
fn fetch_optional<T>(resource: &str, result: Result<Vec<T>, ApiError>) -> Vec<T> {
    match result {
        Ok(values) => values,
        Err(err) => {
            warn!(resource, error = %err, "optional fetch failed, defaulting to empty");
            Vec::new()
        }
    }
}

/// Assemble the full composite for one pull request.
///
/// The primary record is required and aborts the operation on failure; the
/// diffstat, comment and activity fetches are optional and degrade to empty
/// lists. The three secondary requests are issued sequentially.
#[instrument(skip(client, session))]
pub async fn pull_request_detail(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    pr_id: u64,
) -> Result<PullRequestDetail, ApiError> {
    let pr = client
        .get_pull_request(session, workspace, repo_slug, pr_id)
        .await?;

    let diffstat = fetch_optional(
        "diffstat",
        client
            .pull_request_diffstat(session, workspace, repo_slug, pr_id)
            .await,
    );
    let comments = fetch_optional(
        "comments",
        client
            .pull_request_comments(session, workspace, repo_slug, pr_id)
            .await,
    );
    let activity = fetch_optional(
        "activity",
        client
            .pull_request_activity(session, workspace, repo_slug, pr_id)
            .await,
    );

    let summary = PullRequestSummary::from(&pr);
    let diff = DiffSummary::from_entries(&diffstat);
    let participants: Vec<Reviewer> = pr.participants.iter().map(Reviewer::from).collect();
    let reviewers = participants
        .iter()
        .filter(|participant| participant.role.eq_ignore_ascii_case("reviewer"))
        .cloned()
        .collect();

    Ok(PullRequestDetail {
        id: pr.id,
        title: pr.title,
        description: pr.description,
        state: pr.state,
        author: summary.author,
        source_branch: summary.source_branch,
        destination_branch: summary.destination_branch,
        created_on: pr.created_on,
        updated_on: pr.updated_on,
        close_source_branch: pr.close_source_branch,
        reviewers,
        participants,
        file_changes: diff.files,
        change_counts: diff.summary,
        comments: comments.iter().map(CommentEntry::from).collect(),
        activity: activity.iter().map(ActivityEntry::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{test_client, user_body};
    use wiremock::matchers::{method, path, query_param};
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

    fn pr_body() -> serde_json::Value {
        serde_json::json!({
            "id": 7,
            "title": "Add retry-free pagination",
            "description": "Walks every page.",
            "state": "OPEN",
            "author": {"display_name": "Jane Doe", "account_id": "1"},
            "source": {"branch": {"name": "feature/pages"}},
            "destination": {"branch": {"name": "main"}},
            "created_on": "2026-02-01T09:00:00+00:00",
            "updated_on": "2026-02-02T09:00:00+00:00",
            "close_source_branch": true,
            "participants": [
                {"user": {"display_name": "Rev One", "account_id": "2"},
                 "role": "REVIEWER", "approved": true},
                {"user": {"display_name": "Watcher", "account_id": "3"},
                 "role": "PARTICIPANT", "approved": false}
            ]
        })
    }

    #[tokio::test]
    async fn test_composite_degrades_failed_comments_to_empty() {
        let server = MockServer::start().await;
        let (client, session) = authenticated(&server).await;

        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pr_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests/7/diffstat"))
            .respond_with(values(serde_json::json!([
                {"status": "modified", "lines_added": 2, "lines_removed": 1,
                 "old": {"path": "src/lib.rs"}, "new": {"path": "src/lib.rs"}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests/7/comments"))
            .respond_with(ResponseTemplate::new(500).set_body_string("comment store down"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests/7/activity"))
            .respond_with(values(serde_json::json!([
                {"approval": {"date": "2026-02-02T10:00:00+00:00",
                              "user": {"display_name": "Rev One"}}}
            ])))
            .mount(&server)
            .await;

        let detail = pull_request_detail(&client, &session, "acme", "widget", 7)
            .await
            .unwrap();

        assert_eq!(detail.id, 7);
        assert_eq!(detail.author.as_deref(), Some("Jane Doe"));
        assert_eq!(detail.reviewers.len(), 1);
        assert!(detail.reviewers[0].approved);
        assert_eq!(detail.participants.len(), 2);
        assert_eq!(detail.file_changes.len(), 1);
        assert_eq!(detail.change_counts.modified, 1);
        assert!(detail.comments.is_empty());
        assert_eq!(detail.activity.len(), 1);
        assert_eq!(detail.activity[0].kind, "approval");
    }

    #[tokio::test]
    async fn test_composite_fails_when_primary_record_missing() {
        let server = MockServer::start().await;
        let (client, session) = authenticated(&server).await;

        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such pr"))
            .mount(&server)
            .await;

        let err = pull_request_detail(&client, &session, "acme", "widget", 404)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RemoteApi { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_search_filters_by_title_substring() {
        let server = MockServer::start().await;
        let (client, session) = authenticated(&server).await;

        Mock::given(method("GET"))
            .and(path("/repositories/acme/widget/pullrequests"))
            .and(query_param("state", "OPEN"))
            .respond_with(values(serde_json::json!([
                {"id": 1, "title": "Fix login timeout", "state": "OPEN"},
                {"id": 2, "title": "Add dark mode", "state": "OPEN"}
            ])))
            .mount(&server)
            .await;

        let found = search_by_title(&client, &session, "acme", "widget", "LOGIN", "open", 50)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }
}
