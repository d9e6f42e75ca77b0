pub mod types;

pub use types::{Account, Branch, DiffStatEntry, Page, PullRequest, Repository, SrcEntry, Workspace};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::Config;
use types::{ActivityItem, Comment};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated and no account email configured")]
    NotAuthenticated,

    #[error("Authentication failed with status {status}")]
    AuthenticationFailed { status: u16, body: String },

    #[error("Bitbucket API returned status {status}")]
    RemoteApi { status: u16, body: String },

    #[error("{0}")]
    NotFound(String),

    #[error("Repository name '{name}' matches {count} repositories", count = candidates.len())]
    AmbiguousRepository {
        name: String,
        candidates: Vec<String>,
    },

    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// An established authenticated session: the Basic authorization header and
/// the account it was validated against. Cheap to clone; every remote call
/// borrows one.
#[derive(Debug, Clone)]
pub struct Session {
    pub auth_header: String,
    pub user: Account,
}

/// Bitbucket Cloud API client.
///
/// Owns the single `reqwest::Client` and the process-wide session slot.
/// Session establishment is serialized behind the mutex so concurrent
/// callers cannot race duplicate identity checks.
pub struct BitbucketClient {
    http: reqwest::Client,
    api_base: String,
    email: Option<String>,
    token: Option<String>,
    session: Mutex<Option<Session>>,
}

impl BitbucketClient {
    pub fn new(config: &Config) -> Self {
        BitbucketClient {
            http: reqwest::Client::new(),
            api_base: config.api_base(),
            email: config.email(),
            token: config.token(),
            session: Mutex::new(None),
        }
    }

    fn repo_url(&self, workspace: &str, repo_slug: &str) -> String {
        format!("{}/repositories/{}/{}", self.api_base, workspace, repo_slug)
    }

    fn basic_header(email: &str, token: &str) -> String {
        let credentials = format!("{email}:{token}");
        format!("Basic {}", BASE64.encode(credentials))
    }

    /// Return the cached session, establishing it with the configured email
    /// on first use. The lock is held across check, establish and publish.
    pub async fn ensure_session(&self) -> Result<Session, ApiError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let email = self.email.clone().ok_or(ApiError::NotAuthenticated)?;
        let session = self.establish(&email).await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Perform the identity check (with the override or the configured
    /// email) and replace the cached session on success.
    pub async fn authenticate(&self, email_override: Option<&str>) -> Result<Session, ApiError> {
        let mut slot = self.session.lock().await;
        let email = match email_override {
            Some(email) => email.to_string(),
            None => self.email.clone().ok_or(ApiError::NotAuthenticated)?,
        };
        let session = self.establish(&email).await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn establish(&self, email: &str) -> Result<Session, ApiError> {
        let token = self.token.clone().ok_or(ApiError::NotAuthenticated)?;
        let auth_header = Self::basic_header(email, &token);

        let response = self
            .http
            .get(format!("{}/user", self.api_base))
            .header(reqwest::header::AUTHORIZATION, auth_header.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthenticationFailed {
                status: status.as_u16(),
                body,
            });
        }

        let user = response.json::<Account>().await?;
        debug!(user = ?user.label(), "session established");
        Ok(Session { auth_header, user })
    }

    async fn send_get(
        &self,
        session: &Session,
        url: &str,
        query: Option<&[(&str, String)]>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, session.auth_header.as_str());
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: &str,
    ) -> Result<T, ApiError> {
        let response = self.send_get(session, url, None).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.send_get(session, url, Some(query)).await?;
        Ok(response.json::<T>().await?)
    }

    pub(crate) async fn get_text(&self, session: &Session, url: &str) -> Result<String, ApiError> {
        let response = self.send_get(session, url, None).await?;
        Ok(response.text().await?)
    }

    /// Follow the `next` cursor until the collection is exhausted.
    ///
    /// The first request carries the caller's query parameters; every
    /// subsequent request uses only the `next` URL returned by the previous
    /// page. Any non-2xx aborts the whole fetch; partial results are
    /// discarded.
    #[instrument(skip(self, session, params), fields(url = %url))]
    pub(crate) async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let mut items: Vec<T> = Vec::new();
        let mut page: Page<T> = self.get_json_with_query(session, url, params).await?;

        loop {
            items.extend(page.values);
            match page.next {
                Some(next) => page = self.get_json(session, &next).await?,
                None => break,
            }
        }

        debug!(count = items.len(), "collection aggregated");
        Ok(items)
    }

    pub async fn list_workspaces(&self, session: &Session) -> Result<Vec<Workspace>, ApiError> {
        let url = format!("{}/workspaces", self.api_base);
        self.fetch_all_pages(session, &url, &[]).await
    }

    pub async fn list_workspace_repositories(
        &self,
        session: &Session,
        workspace: &str,
        page_size: u32,
    ) -> Result<Vec<Repository>, ApiError> {
        let url = format!("{}/repositories/{}", self.api_base, workspace);
        let params = [
            ("pagelen", page_size.to_string()),
            ("sort", "-updated_on".to_string()),
        ];
        self.fetch_all_pages(session, &url, &params).await
    }

    /// Repositories visible to the authenticated user across the whole
    /// instance (the un-scoped `/repositories` listing).
    pub async fn list_user_repositories(
        &self,
        session: &Session,
        page_size: u32,
    ) -> Result<Vec<Repository>, ApiError> {
        let url = format!("{}/repositories", self.api_base);
        let params = [
            ("pagelen", page_size.to_string()),
            ("sort", "-updated_on".to_string()),
        ];
        self.fetch_all_pages(session, &url, &params).await
    }

    pub async fn list_branches(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
    ) -> Result<Vec<Branch>, ApiError> {
        let url = format!("{}/refs/branches", self.repo_url(workspace, repo_slug));
        let params = [
            ("pagelen", "100".to_string()),
            ("sort", "-name".to_string()),
        ];
        self.fetch_all_pages(session, &url, &params).await
    }

    /// Repository record lookup, used as the existence preflight before
    /// tree walks.
    pub async fn get_repository(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
    ) -> Result<Repository, ApiError> {
        let url = self.repo_url(workspace, repo_slug);
        self.get_json(session, &url).await
    }

    /// Directory listing of `path` on `branch`. Only valid for directory
    /// paths; file paths return raw content on this endpoint and are read
    /// through [`BitbucketClient::file_content`] instead.
    pub async fn list_directory(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        branch: &str,
        path: &str,
    ) -> Result<Vec<SrcEntry>, ApiError> {
        let url = format!(
            "{}/src/{}/{}",
            self.repo_url(workspace, repo_slug),
            branch,
            path
        );
        let page: Page<SrcEntry> = self.get_json(session, &url).await?;
        Ok(page.values)
    }

    pub async fn file_content(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        branch: &str,
        file_path: &str,
    ) -> Result<String, ApiError> {
        let url = format!(
            "{}/src/{}/{}",
            self.repo_url(workspace, repo_slug),
            branch,
            file_path
        );
        self.get_text(session, &url).await
    }

    pub async fn list_pull_requests(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        state: &str,
        page_size: u32,
    ) -> Result<Vec<PullRequest>, ApiError> {
        let url = format!("{}/pullrequests", self.repo_url(workspace, repo_slug));
        let params = [
            ("pagelen", page_size.to_string()),
            ("state", state.to_uppercase()),
            ("sort", "-updated_on".to_string()),
        ];
        self.fetch_all_pages(session, &url, &params).await
    }

    pub async fn get_pull_request(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        pr_id: u64,
    ) -> Result<PullRequest, ApiError> {
        let url = format!("{}/pullrequests/{}", self.repo_url(workspace, repo_slug), pr_id);
        self.get_json(session, &url).await
    }

    pub async fn pull_request_diffstat(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        pr_id: u64,
    ) -> Result<Vec<DiffStatEntry>, ApiError> {
        let url = format!(
            "{}/pullrequests/{}/diffstat",
            self.repo_url(workspace, repo_slug),
            pr_id
        );
        let page: Page<DiffStatEntry> = self.get_json(session, &url).await?;
        Ok(page.values)
    }

    pub async fn pull_request_comments(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        pr_id: u64,
    ) -> Result<Vec<Comment>, ApiError> {
        let url = format!(
            "{}/pullrequests/{}/comments",
            self.repo_url(workspace, repo_slug),
            pr_id
        );
        let page: Page<Comment> = self.get_json(session, &url).await?;
        Ok(page.values)
    }

    pub async fn pull_request_activity(
        &self,
        session: &Session,
        workspace: &str,
        repo_slug: &str,
        pr_id: u64,
    ) -> Result<Vec<ActivityItem>, ApiError> {
        let url = format!(
            "{}/pullrequests/{}/activity",
            self.repo_url(workspace, repo_slug),
            pr_id
        );
        let page: Page<ActivityItem> = self.get_json(session, &url).await?;
        Ok(page.values)
    }
}
