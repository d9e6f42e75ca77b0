pub mod types;

use std::path::Path;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use tracing::warn;

use crate::api::{ApiError, BitbucketClient, Session};
use crate::envelope::ToolResult;
use crate::tree::{self, TraversalBudget};
use crate::{pulls, resolve, snapshot};

use types::*;

type ToolReply<T> = Result<Json<ToolResult<T>>, ErrorData>;

fn reply<T>(result: ToolResult<T>) -> ToolReply<T> {
    Ok(Json(result))
}

fn fail<T>(err: &ApiError) -> ToolReply<T> {
    reply(ToolResult::from_api_error(err))
}

/// The Bitbucket gateway exposed over MCP. Every tool resolves the shared
/// session first, performs its remote calls sequentially, and returns a
/// [`ToolResult`] envelope; failures never surface as transport errors.
#[derive(Clone)]
pub struct BitbucketMcp {
    client: Arc<BitbucketClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BitbucketMcp {
    pub fn new(client: BitbucketClient) -> Self {
        BitbucketMcp {
            client: Arc::new(client),
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    async fn session(&self) -> Result<Session, ApiError> {
        self.client.ensure_session().await
    }

    /// Authenticate with Bitbucket using email and token; establishes the
    /// session used by every other tool.
    #[tool(name = "authenticate")]
    async fn authenticate(&self, params: Parameters<AuthenticateParams>) -> ToolReply<AuthPayload> {
        match self.client.authenticate(params.0.email.as_deref()).await {
            Ok(session) => {
                let message = format!(
                    "Authenticated as {}",
                    session.user.label().unwrap_or("unknown account")
                );
                reply(ToolResult::ok(AuthPayload {
                    user: session.user,
                    message,
                }))
            }
            Err(err) => fail(&err),
        }
    }

    /// List the workspaces the authenticated user has access to.
    #[tool(name = "get_workspaces")]
    async fn get_workspaces(&self) -> ToolReply<WorkspacesPayload> {
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match self.client.list_workspaces(&session).await {
            Ok(workspaces) => reply(ToolResult::ok(WorkspacesPayload {
                count: workspaces.len(),
                workspaces,
            })),
            Err(err) => fail(&err),
        }
    }

    /// List repositories of one workspace, or all repositories visible to
    /// the user when no workspace is given.
    #[tool(name = "get_repositories")]
    async fn get_repositories(
        &self,
        params: Parameters<RepositoriesParams>,
    ) -> ToolReply<RepositoriesPayload> {
        let RepositoriesParams {
            workspace,
            page_size,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };

        let result = match &workspace {
            Some(slug) => {
                self.client
                    .list_workspace_repositories(&session, slug, page_size)
                    .await
            }
            None => self.client.list_user_repositories(&session, page_size).await,
        };
        match result {
            Ok(repositories) => reply(ToolResult::ok(RepositoriesPayload {
                workspace,
                count: repositories.len(),
                repositories,
            })),
            Err(err) => fail(&err),
        }
    }

    /// List repositories from every accessible workspace, grouped per
    /// workspace; workspaces that fail to list are skipped.
    #[tool(name = "get_all_repositories")]
    async fn get_all_repositories(
        &self,
        params: Parameters<AllRepositoriesParams>,
    ) -> ToolReply<AllRepositoriesPayload> {
        let page_size = params.0.page_size;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };

        let workspaces = match self.client.list_workspaces(&session).await {
            Ok(workspaces) => workspaces,
            Err(err) => return fail(&err),
        };

        let mut repositories = Vec::new();
        let mut workspace_details = Vec::new();
        for workspace in &workspaces {
            match self
                .client
                .list_workspace_repositories(&session, &workspace.slug, page_size)
                .await
            {
                Ok(found) => {
                    workspace_details.push(WorkspaceRepositories {
                        workspace: workspace.slug.clone(),
                        workspace_name: workspace.name.clone(),
                        count: found.len(),
                        repositories: found.clone(),
                    });
                    repositories.extend(found);
                }
                Err(err) => {
                    warn!(workspace = %workspace.slug, error = %err, "repository listing failed, skipping workspace");
                }
            }
        }

        reply(ToolResult::ok(AllRepositoriesPayload {
            total_count: repositories.len(),
            workspaces_processed: workspaces.len(),
            repositories,
            workspace_details,
        }))
    }

    /// Find repositories by full or partial name across every accessible
    /// workspace.
    #[tool(name = "find_repository")]
    async fn find_repository(
        &self,
        params: Parameters<FindRepositoryParams>,
    ) -> ToolReply<FindRepositoryPayload> {
        let name = params.0.name;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match resolve::resolve_repository(&self.client, &session, &name).await {
            Ok(matches) => reply(ToolResult::ok(FindRepositoryPayload {
                query: name,
                count: matches.len(),
                matches,
            })),
            Err(err) => fail(&err),
        }
    }

    /// List branches of a repository with commit details and the detected
    /// default branch.
    #[tool(name = "get_repository_branches")]
    async fn get_repository_branches(
        &self,
        params: Parameters<BranchesParams>,
    ) -> ToolReply<BranchesPayload> {
        let BranchesParams {
            workspace,
            repo_slug,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match self.client.list_branches(&session, &workspace, &repo_slug).await {
            Ok(branches) => {
                let default_branch = tree::detect_default_branch(&branches);
                let branches: Vec<_> = branches.into_iter().map(Into::into).collect();
                reply(ToolResult::ok(BranchesPayload {
                    workspace,
                    repository: repo_slug,
                    default_branch,
                    count: branches.len(),
                    branches,
                }))
            }
            Err(err) => fail(&err),
        }
    }

    /// Fetch the file/directory tree of a repository, optionally capped to
    /// `max_items` nodes, inlining content for text-like files.
    #[tool(name = "get_repository_tree")]
    async fn get_repository_tree(&self, params: Parameters<TreeParams>) -> ToolReply<TreePayload> {
        let TreeParams {
            workspace,
            repo_slug,
            branch,
            path,
            max_items,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };

        let (workspace, repo_slug) = match workspace {
            Some(workspace) => (workspace, repo_slug),
            None => match resolve::resolve_single(&self.client, &session, &repo_slug).await {
                Ok(found) => (found.workspace, found.repository.slug),
                Err(err) => return fail(&err),
            },
        };

        if let Err(err) = self
            .client
            .get_repository(&session, &workspace, &repo_slug)
            .await
        {
            return fail(&err);
        }

        let branch =
            match tree::resolve_branch(&self.client, &session, &workspace, &repo_slug, &branch)
                .await
            {
                Ok(branch) => branch,
                Err(err) => return fail(&err),
            };

        let mut budget = TraversalBudget::from_limit(max_items);
        let structure = match tree::fetch_tree(
            &self.client,
            &session,
            &workspace,
            &repo_slug,
            &branch,
            &path,
            &mut budget,
        )
        .await
        {
            Ok(Some(node)) => node,
            Ok(None) => {
                return reply(ToolResult::fail(
                    "Traversal budget admits no nodes; use a max_items of at least 1",
                ))
            }
            Err(err) => return fail(&err),
        };

        let stats = tree::count_nodes(&structure);
        reply(ToolResult::ok(TreePayload {
            workspace,
            repository: repo_slug,
            branch,
            structure,
            files_count: stats.files,
            directories_count: stats.directories,
            total_items: stats.total(),
            truncated: budget.is_exhausted(),
        }))
    }

    /// Get the raw content of a single file.
    #[tool(name = "get_file_content")]
    async fn get_file_content(
        &self,
        params: Parameters<FileContentParams>,
    ) -> ToolReply<FileContentPayload> {
        let FileContentParams {
            workspace,
            repo_slug,
            file_path,
            branch,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match self
            .client
            .file_content(&session, &workspace, &repo_slug, &branch, &file_path)
            .await
        {
            Ok(content) => reply(ToolResult::ok(FileContentPayload {
                workspace,
                repository: repo_slug,
                branch,
                file_path,
                size: content.len(),
                content,
            })),
            Err(err) => {
                let result = ToolResult::from_api_error(&err);
                let result = if matches!(err, ApiError::RemoteApi { status: 404, .. }) {
                    result.with_suggestion(
                        "Verify the file path and branch; get_repository_branches lists the \
                         available branches",
                    )
                } else {
                    result
                };
                reply(result)
            }
        }
    }

    /// List every file path in a repository (no content), plus the subset
    /// recognized as code files.
    #[tool(name = "list_repository_files")]
    async fn list_repository_files(
        &self,
        params: Parameters<FilesListParams>,
    ) -> ToolReply<FilesListPayload> {
        let FilesListParams {
            workspace,
            repo_slug,
            branch,
            path,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };

        let branch =
            match tree::resolve_branch(&self.client, &session, &workspace, &repo_slug, &branch)
                .await
            {
                Ok(branch) => branch,
                Err(err) => return fail(&err),
            };

        match tree::list_file_paths(&self.client, &session, &workspace, &repo_slug, &branch, &path)
            .await
        {
            Ok(all_files) => {
                let code_files: Vec<String> = all_files
                    .iter()
                    .filter(|file| tree::is_code_file(file))
                    .cloned()
                    .collect();
                reply(ToolResult::ok(FilesListPayload {
                    workspace,
                    repository: repo_slug,
                    branch,
                    total_files: all_files.len(),
                    code_files_count: code_files.len(),
                    all_files,
                    code_files,
                }))
            }
            Err(err) => fail(&err),
        }
    }

    /// List pull requests of a repository filtered by state.
    #[tool(name = "get_pull_requests")]
    async fn get_pull_requests(
        &self,
        params: Parameters<PullRequestsParams>,
    ) -> ToolReply<PullRequestsPayload> {
        let PullRequestsParams {
            workspace,
            repo_slug,
            state,
            page_size,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match pulls::list_summaries(&self.client, &session, &workspace, &repo_slug, &state, page_size)
            .await
        {
            Ok(pull_requests) => reply(ToolResult::ok(PullRequestsPayload {
                workspace,
                repository: repo_slug,
                state: state.to_uppercase(),
                count: pull_requests.len(),
                pull_requests,
            })),
            Err(err) => fail(&err),
        }
    }

    /// Search pull requests whose title contains a substring.
    #[tool(name = "search_pull_requests")]
    async fn search_pull_requests(
        &self,
        params: Parameters<SearchPullRequestsParams>,
    ) -> ToolReply<SearchPullRequestsPayload> {
        let SearchPullRequestsParams {
            workspace,
            repo_slug,
            query,
            state,
            page_size,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match pulls::search_by_title(
            &self.client,
            &session,
            &workspace,
            &repo_slug,
            &query,
            &state,
            page_size,
        )
        .await
        {
            Ok(matches) => reply(ToolResult::ok(SearchPullRequestsPayload {
                workspace,
                repository: repo_slug,
                query,
                count: matches.len(),
                matches,
            })),
            Err(err) => fail(&err),
        }
    }

    /// Get the files changed by a pull request, grouped by change type.
    #[tool(name = "get_pull_request_files")]
    async fn get_pull_request_files(
        &self,
        params: Parameters<PullRequestFilesParams>,
    ) -> ToolReply<PullRequestFilesPayload> {
        let PullRequestFilesParams {
            workspace,
            repo_slug,
            pr_id,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match pulls::diff_summary(&self.client, &session, &workspace, &repo_slug, pr_id).await {
            Ok(diff) => reply(ToolResult::ok(PullRequestFilesPayload {
                workspace,
                repository: repo_slug,
                pr_id,
                diff,
            })),
            Err(err) => fail(&err),
        }
    }

    /// Get the full detail composite of a pull request: core record,
    /// reviewers, file changes, comments and activity.
    #[tool(name = "get_pull_request_details")]
    async fn get_pull_request_details(
        &self,
        params: Parameters<PullRequestDetailsParams>,
    ) -> ToolReply<PullRequestDetailsPayload> {
        let PullRequestDetailsParams {
            workspace,
            repo_slug,
            pr_id,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };
        match pulls::pull_request_detail(&self.client, &session, &workspace, &repo_slug, pr_id).await
        {
            Ok(pull_request) => reply(ToolResult::ok(PullRequestDetailsPayload {
                workspace,
                repository: repo_slug,
                pull_request,
            })),
            Err(err) => fail(&err),
        }
    }

    /// Fetch a repository tree and persist it to a local JSON file.
    #[tool(name = "save_repository_snapshot")]
    async fn save_repository_snapshot(
        &self,
        params: Parameters<SnapshotParams>,
    ) -> ToolReply<SnapshotPayload> {
        let SnapshotParams {
            workspace,
            repo_slug,
            filename,
            branch,
            path,
            max_items,
        } = params.0;
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return fail(&err),
        };

        if let Err(err) = self
            .client
            .get_repository(&session, &workspace, &repo_slug)
            .await
        {
            return fail(&err);
        }

        let branch =
            match tree::resolve_branch(&self.client, &session, &workspace, &repo_slug, &branch)
                .await
            {
                Ok(branch) => branch,
                Err(err) => return fail(&err),
            };

        let mut budget = TraversalBudget::from_limit(max_items);
        let structure = match tree::fetch_tree(
            &self.client,
            &session,
            &workspace,
            &repo_slug,
            &branch,
            &path,
            &mut budget,
        )
        .await
        {
            Ok(Some(node)) => node,
            Ok(None) => {
                return reply(ToolResult::fail(
                    "Traversal budget admits no nodes; use a max_items of at least 1",
                ))
            }
            Err(err) => return fail(&err),
        };

        if let Err(err) =
            snapshot::save_tree_snapshot(Path::new(&filename), &workspace, &repo_slug, &branch, &structure)
        {
            return reply(ToolResult::local_fault(err.to_string()));
        }

        let total_items = tree::count_nodes(&structure).total();
        let message = format!("Tree snapshot saved to {filename}");
        reply(ToolResult::ok(SnapshotPayload {
            filename,
            workspace,
            repository: repo_slug,
            branch,
            total_items,
            message,
        }))
    }
}

#[tool_handler]
impl ServerHandler for BitbucketMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Bitbucket Cloud gateway (tools: authenticate, get_workspaces, \
                 get_repositories, get_all_repositories, find_repository, \
                 get_repository_branches, get_repository_tree, get_file_content, \
                 list_repository_files, get_pull_requests, search_pull_requests, \
                 get_pull_request_files, get_pull_request_details, \
                 save_repository_snapshot)"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
