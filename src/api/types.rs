use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One page of a Bitbucket collection. Every list endpoint returns this
/// shape: the items under `values` and an opaque `next` URL that is absent
/// on the terminal page.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// A Bitbucket user account as returned by `/user` and nested inside
/// pull requests, comments and activity entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl Account {
    /// Best available human-readable name for this account.
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.nickname.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Workspace {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Repository {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub mainbranch: Option<BranchRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BranchRef {
    #[serde(default)]
    pub name: String,
}

/// A branch as returned by `/refs/branches`, with the commit it points at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target: Option<CommitTarget>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitTarget {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub raw: Option<String>,
}

/// Flat branch projection exposed by the branch-listing tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BranchInfo {
    pub name: String,
    pub hash: Option<String>,
    pub short_hash: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub message: Option<String>,
}

impl From<Branch> for BranchInfo {
    fn from(branch: Branch) -> Self {
        let target = branch.target.unwrap_or_default();
        let short_hash = target
            .hash
            .as_ref()
            .map(|hash| hash.chars().take(8).collect());
        BranchInfo {
            name: branch.name,
            hash: target.hash,
            short_hash,
            author: target.author.and_then(|author| author.raw),
            date: target.date,
            message: target.message,
        }
    }
}

/// One entry of a `/src/{branch}/{path}` directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SrcEntry {
    #[serde(rename = "type", default)]
    pub kind: SrcEntryKind,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SrcEntryKind {
    CommitFile,
    CommitDirectory,
    #[default]
    #[serde(other)]
    Other,
}

/// A pull request record as returned by `/pullrequests` endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<Account>,
    #[serde(default)]
    pub source: Option<PrEndpoint>,
    #[serde(default)]
    pub destination: Option<PrEndpoint>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub close_source_branch: bool,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub task_count: Option<u64>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrEndpoint {
    #[serde(default)]
    pub branch: Option<BranchRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub user: Option<Account>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub approved: bool,
}

/// One per-file entry of a pull request diffstat.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffStatEntry {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub lines_added: u64,
    #[serde(default)]
    pub lines_removed: u64,
    #[serde(default)]
    pub old: Option<PathRef>,
    #[serde(default)]
    pub new: Option<PathRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathRef {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub content: Option<CommentContent>,
    #[serde(default)]
    pub user: Option<Account>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentContent {
    #[serde(default)]
    pub raw: String,
}

/// One entry of a pull request activity feed. Exactly one of the variant
/// fields is populated per entry; anything else is an unknown kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityItem {
    #[serde(default)]
    pub update: Option<ActivityUpdate>,
    #[serde(default)]
    pub approval: Option<ActivityApproval>,
    #[serde(default)]
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityUpdate {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author: Option<Account>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityApproval {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub user: Option<Account>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_when_fields_missing() {
        let page: Page<Workspace> = serde_json::from_str("{}").unwrap();
        assert!(page.values.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_src_entry_kind_tolerates_unknown() {
        let entry: SrcEntry =
            serde_json::from_str(r#"{"type": "commit_somethingelse", "path": "x"}"#).unwrap();
        assert_eq!(entry.kind, SrcEntryKind::Other);
    }

    #[test]
    fn test_branch_info_projection() {
        let branch: Branch = serde_json::from_str(
            r#"{
                "name": "develop",
                "target": {
                    "hash": "0123456789abcdef",
                    "date": "2026-01-05T10:00:00+00:00",
                    "message": "Fix pagination",
                    "author": {"raw": "Dev <dev@example.com>"}
                }
            }"#,
        )
        .unwrap();
        let info = BranchInfo::from(branch);
        assert_eq!(info.name, "develop");
        assert_eq!(info.short_hash.as_deref(), Some("01234567"));
        assert_eq!(info.author.as_deref(), Some("Dev <dev@example.com>"));
    }

    #[test]
    fn test_pull_request_tolerates_sparse_record() {
        let pr: PullRequest = serde_json::from_str(r#"{"id": 7, "title": "Hotfix"}"#).unwrap();
        assert_eq!(pr.id, 7);
        assert_eq!(pr.state, "");
        assert!(pr.author.is_none());
        assert!(pr.participants.is_empty());
    }

    #[test]
    fn test_account_label_preference() {
        let account = Account {
            username: Some("jdoe".into()),
            display_name: Some("Jane Doe".into()),
            ..Account::default()
        };
        assert_eq!(account.label(), Some("Jane Doe"));

        let account = Account {
            username: Some("jdoe".into()),
            ..Account::default()
        };
        assert_eq!(account.label(), Some("jdoe"));
    }
}
