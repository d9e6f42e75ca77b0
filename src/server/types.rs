use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::types::BranchInfo;
use crate::api::{Account, Repository, Workspace};
use crate::pulls::{DiffSummary, PullRequestDetail, PullRequestSummary};
use crate::resolve::RepositoryMatch;
use crate::tree::TreeNode;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

fn default_branch() -> String {
    "main".to_string()
}

fn default_state() -> String {
    "OPEN".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

// ---- tool parameters ----

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AuthenticateParams {
    /// Bitbucket account email; falls back to the configured one.
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RepositoriesParams {
    /// Workspace slug; when absent, lists repositories visible to the user.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AllRepositoriesParams {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindRepositoryParams {
    /// Full or partial repository name or slug, matched case-insensitively.
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BranchesParams {
    pub workspace: String,
    pub repo_slug: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TreeParams {
    /// Workspace slug; when absent, `repo_slug` is resolved across all
    /// accessible workspaces and must match exactly one repository.
    #[serde(default)]
    pub workspace: Option<String>,
    pub repo_slug: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Path within the repository; empty means the root.
    #[serde(default)]
    pub path: String,
    /// Maximum number of files/directories to emit; absent means unbounded.
    #[serde(default)]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FileContentParams {
    pub workspace: String,
    pub repo_slug: String,
    pub file_path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FilesListParams {
    pub workspace: String,
    pub repo_slug: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PullRequestsParams {
    pub workspace: String,
    pub repo_slug: String,
    /// OPEN, MERGED, DECLINED or SUPERSEDED.
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchPullRequestsParams {
    pub workspace: String,
    pub repo_slug: String,
    /// Title substring, matched case-insensitively.
    pub query: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PullRequestFilesParams {
    pub workspace: String,
    pub repo_slug: String,
    pub pr_id: u64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PullRequestDetailsParams {
    pub workspace: String,
    pub repo_slug: String,
    pub pr_id: u64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SnapshotParams {
    pub workspace: String,
    pub repo_slug: String,
    /// Local file the snapshot JSON is written to.
    pub filename: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub max_items: Option<usize>,
}

// ---- tool payloads ----

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AuthPayload {
    pub user: Account,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkspacesPayload {
    pub workspaces: Vec<Workspace>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RepositoriesPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub repositories: Vec<Repository>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkspaceRepositories {
    pub workspace: String,
    pub workspace_name: String,
    pub repositories: Vec<Repository>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AllRepositoriesPayload {
    pub repositories: Vec<Repository>,
    pub total_count: usize,
    pub workspaces_processed: usize,
    pub workspace_details: Vec<WorkspaceRepositories>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FindRepositoryPayload {
    pub query: String,
    pub matches: Vec<RepositoryMatch>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BranchesPayload {
    pub workspace: String,
    pub repository: String,
    pub branches: Vec<BranchInfo>,
    pub default_branch: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TreePayload {
    pub workspace: String,
    pub repository: String,
    /// The branch actually walked, after fallback substitution.
    pub branch: String,
    pub structure: TreeNode,
    pub files_count: usize,
    pub directories_count: usize,
    pub total_items: usize,
    /// True when the traversal budget cut the walk short.
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileContentPayload {
    pub workspace: String,
    pub repository: String,
    pub branch: String,
    pub file_path: String,
    pub content: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FilesListPayload {
    pub workspace: String,
    pub repository: String,
    pub branch: String,
    pub all_files: Vec<String>,
    pub code_files: Vec<String>,
    pub total_files: usize,
    pub code_files_count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PullRequestsPayload {
    pub workspace: String,
    pub repository: String,
    pub state: String,
    pub pull_requests: Vec<PullRequestSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SearchPullRequestsPayload {
    pub workspace: String,
    pub repository: String,
    pub query: String,
    pub matches: Vec<PullRequestSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PullRequestFilesPayload {
    pub workspace: String,
    pub repository: String,
    pub pr_id: u64,
    #[serde(flatten)]
    pub diff: DiffSummary,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PullRequestDetailsPayload {
    pub workspace: String,
    pub repository: String,
    pub pull_request: PullRequestDetail,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SnapshotPayload {
    pub filename: String,
    pub workspace: String,
    pub repository: String,
    pub branch: String,
    pub total_items: usize,
    pub message: String,
}
