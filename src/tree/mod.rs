use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::api::types::SrcEntryKind;
use crate::api::{ApiError, BitbucketClient, Branch, Session, SrcEntry};

/// Extensions whose file content is inlined into the tree.
const TEXT_CONTENT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".cpp", ".c", ".h", ".html", ".css", ".json", ".xml", ".md",
    ".txt", ".yml", ".yaml", ".sh", ".bat", ".ps1",
];

/// Wider extension set used to report the code-file subset of a path
/// listing (content is never fetched for the extra ones).
const CODE_FILE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".cpp", ".c", ".h", ".html", ".css", ".json", ".xml", ".md",
    ".txt", ".yml", ".yaml", ".sh", ".bat", ".ps1", ".dart", ".kt", ".swift", ".rb", ".php",
    ".go", ".rs", ".cs", ".vb", ".sql",
];

/// Branches tried, in order, when the requested branch does not exist.
const BRANCH_FALLBACKS: &[&str] = &["main", "master", "develop", "dev"];

pub fn has_text_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    TEXT_CONTENT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn is_code_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    CODE_FILE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A node of the fetched repository tree. Children keep the remote listing
/// order; `content` is only ever populated for allow-listed file extensions.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        path: String,
        size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Directory {
        path: String,
        children: Vec<TreeNode>,
    },
}

/// Node allowance for one whole walk request.
///
/// Every emitted node, the root directory included, costs one unit,
/// charged before the walk descends into it. Exhaustion is global: once the
/// budget hits zero no further node is added anywhere in the tree.
#[derive(Debug, Clone, Copy)]
pub struct TraversalBudget {
    remaining: Option<usize>,
}

impl TraversalBudget {
    pub fn unbounded() -> Self {
        TraversalBudget { remaining: None }
    }

    pub fn limited(max_items: usize) -> Self {
        TraversalBudget {
            remaining: Some(max_items),
        }
    }

    pub fn from_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(max_items) => Self::limited(max_items),
            None => Self::unbounded(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.remaining, Some(0))
    }

    /// Take one unit. Returns false (and charges nothing) when exhausted.
    pub fn try_charge(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

/// File/directory totals of a fetched tree, root included.
#[derive(Debug, Clone, Copy, Default, Serialize, JsonSchema)]
pub struct TreeStats {
    pub files: usize,
    pub directories: usize,
}

impl TreeStats {
    pub fn total(&self) -> usize {
        self.files + self.directories
    }
}

pub fn count_nodes(node: &TreeNode) -> TreeStats {
    let mut stats = TreeStats::default();
    fn visit(node: &TreeNode, stats: &mut TreeStats) {
        match node {
            TreeNode::File { .. } => stats.files += 1,
            TreeNode::Directory { children, .. } => {
                stats.directories += 1;
                for child in children {
                    visit(child, stats);
                }
            }
        }
    }
    visit(node, &mut stats);
    stats
}

/// Pick the branch a walk should use: the requested one if it exists,
/// else the first fallback present, else the first listed branch.
pub async fn resolve_branch(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    requested: &str,
) -> Result<String, ApiError> {
    let branches = client.list_branches(session, workspace, repo_slug).await?;
    if branches.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No branches found in {workspace}/{repo_slug}"
        )));
    }

    if branches.iter().any(|branch| branch.name == requested) {
        return Ok(requested.to_string());
    }

    let fallback = BRANCH_FALLBACKS
        .iter()
        .find(|name| branches.iter().any(|branch| &branch.name == *name))
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| branches[0].name.clone());
    debug!(requested, fallback = %fallback, "requested branch absent, substituting");
    Ok(fallback)
}

/// Default branch reported by the branch-listing tool: `main`, `master` or
/// `develop` when present, else the first listed branch.
pub fn detect_default_branch(branches: &[Branch]) -> Option<String> {
    for name in ["main", "master", "develop"] {
        if branches.iter().any(|branch| branch.name == name) {
            return Some(name.to_string());
        }
    }
    branches.first().map(|branch| branch.name.clone())
}

/// Walk the repository tree rooted at `path` on an already-resolved
/// `branch`, honoring `budget`.
///
/// The root listing is required: a non-2xx there aborts the walk. Below the
/// root, a subdirectory whose listing fails is dropped from the output with
/// a warning, and a file whose content fetch fails keeps `content: None`.
/// Returns `None` only when the budget admits no node at all.
#[instrument(skip(client, session, budget))]
pub async fn fetch_tree(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    branch: &str,
    path: &str,
    budget: &mut TraversalBudget,
) -> Result<Option<TreeNode>, ApiError> {
    let entries = client
        .list_directory(session, workspace, repo_slug, branch, path)
        .await?;
    let node = build_directory(client, session, workspace, repo_slug, branch, path, entries, budget)
        .await;
    Ok(node)
}

#[allow(clippy::too_many_arguments)]
async fn build_directory(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    branch: &str,
    dir_path: &str,
    entries: Vec<SrcEntry>,
    budget: &mut TraversalBudget,
) -> Option<TreeNode> {
    if !budget.try_charge() {
        return None;
    }

    let mut children = Vec::new();
    for entry in entries {
        if budget.is_exhausted() {
            break;
        }
        match entry.kind {
            SrcEntryKind::CommitFile => {
                budget.try_charge();
                let content = if has_text_extension(&entry.path) {
                    match client
                        .file_content(session, workspace, repo_slug, branch, &entry.path)
                        .await
                    {
                        Ok(text) => Some(text),
                        Err(err) => {
                            warn!(path = %entry.path, error = %err, "file content fetch failed");
                            None
                        }
                    }
                } else {
                    None
                };
                children.push(TreeNode::File {
                    path: entry.path,
                    size: entry.size.unwrap_or(0),
                    content,
                });
            }
            SrcEntryKind::CommitDirectory => {
                match client
                    .list_directory(session, workspace, repo_slug, branch, &entry.path)
                    .await
                {
                    Ok(sub_entries) => {
                        let sub_node = Box::pin(build_directory(
                            client,
                            session,
                            workspace,
                            repo_slug,
                            branch,
                            &entry.path,
                            sub_entries,
                            budget,
                        ))
                        .await;
                        if let Some(node) = sub_node {
                            children.push(node);
                        }
                    }
                    Err(err) => {
                        warn!(path = %entry.path, error = %err, "directory listing failed, dropping subtree");
                    }
                }
            }
            SrcEntryKind::Other => {}
        }
    }

    Some(TreeNode::Directory {
        path: dir_path.to_string(),
        children,
    })
}

/// Collect every file path reachable from `path`, without content.
///
/// Same degrade policy as [`fetch_tree`]: the root listing is required,
/// unreachable subdirectories are skipped with a warning.
pub async fn list_file_paths(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    branch: &str,
    path: &str,
) -> Result<Vec<String>, ApiError> {
    let entries = client
        .list_directory(session, workspace, repo_slug, branch, path)
        .await?;
    let mut files = Vec::new();
    collect_file_paths(client, session, workspace, repo_slug, branch, entries, &mut files).await;
    Ok(files)
}

async fn collect_file_paths(
    client: &BitbucketClient,
    session: &Session,
    workspace: &str,
    repo_slug: &str,
    branch: &str,
    entries: Vec<SrcEntry>,
    files: &mut Vec<String>,
) {
    for entry in entries {
        match entry.kind {
            SrcEntryKind::CommitFile => files.push(entry.path),
            SrcEntryKind::CommitDirectory => {
                match client
                    .list_directory(session, workspace, repo_slug, branch, &entry.path)
                    .await
                {
                    Ok(sub_entries) => {
                        Box::pin(collect_file_paths(
                            client,
                            session,
                            workspace,
                            repo_slug,
                            branch,
                            sub_entries,
                            files,
                        ))
                        .await;
                    }
                    Err(err) => {
                        warn!(path = %entry.path, error = %err, "directory listing failed, skipping");
                    }
                }
            }
            SrcEntryKind::Other => {}
        }
    }
}
