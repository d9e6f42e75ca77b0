use schemars::JsonSchema;
use serde::Serialize;

use crate::api::types::{ActivityItem, Comment, Participant};
use crate::api::{DiffStatEntry, PullRequest};

/// Flat pull request projection used by list and search responses.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PullRequestSummary {
    pub id: u64,
    pub title: String,
    pub state: String,
    pub author: Option<String>,
    pub source_branch: Option<String>,
    pub destination_branch: Option<String>,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
    pub comment_count: Option<u64>,
    pub task_count: Option<u64>,
}

impl From<&PullRequest> for PullRequestSummary {
    fn from(pr: &PullRequest) -> Self {
        PullRequestSummary {
            id: pr.id,
            title: pr.title.clone(),
            state: pr.state.clone(),
            author: pr.author.as_ref().and_then(|author| author.label().map(String::from)),
            source_branch: branch_name(&pr.source),
            destination_branch: branch_name(&pr.destination),
            created_on: pr.created_on.clone(),
            updated_on: pr.updated_on.clone(),
            comment_count: pr.comment_count,
            task_count: pr.task_count,
        }
    }
}

fn branch_name(endpoint: &Option<crate::api::types::PrEndpoint>) -> Option<String> {
    endpoint
        .as_ref()
        .and_then(|endpoint| endpoint.branch.as_ref())
        .map(|branch| branch.name.clone())
}

/// Flat participant projection (used for both reviewers and the full
/// participant list; `role` tells them apart).
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Reviewer {
    pub display_name: Option<String>,
    pub account_id: Option<String>,
    pub approved: bool,
    pub role: String,
}

impl From<&Participant> for Reviewer {
    fn from(participant: &Participant) -> Self {
        let user = participant.user.clone().unwrap_or_default();
        Reviewer {
            display_name: user.label().map(String::from),
            account_id: user.account_id,
            approved: participant.approved,
            role: participant.role.clone(),
        }
    }
}

/// One file of a pull request diffstat, flattened.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileChange {
    pub path: Option<String>,
    pub status: String,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

impl From<&DiffStatEntry> for FileChange {
    fn from(entry: &DiffStatEntry) -> Self {
        let old_path = entry.old.as_ref().map(|path_ref| path_ref.path.clone());
        let new_path = entry.new.as_ref().map(|path_ref| path_ref.path.clone());
        FileChange {
            path: new_path.clone().or_else(|| old_path.clone()),
            status: entry.status.clone(),
            lines_added: entry.lines_added,
            lines_removed: entry.lines_removed,
            old_path,
            new_path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, JsonSchema)]
pub struct ChangeCounts {
    pub total_files: usize,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub renamed: usize,
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct CategorizedChanges {
    pub added: Vec<FileChange>,
    pub modified: Vec<FileChange>,
    pub removed: Vec<FileChange>,
    pub renamed: Vec<FileChange>,
}

/// Diffstat entries grouped by change type, with per-type counts.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct DiffSummary {
    pub files: Vec<FileChange>,
    pub summary: ChangeCounts,
    pub categorized: CategorizedChanges,
}

impl DiffSummary {
    pub fn from_entries(entries: &[DiffStatEntry]) -> Self {
        let files: Vec<FileChange> = entries.iter().map(FileChange::from).collect();
        let mut categorized = CategorizedChanges::default();
        for change in &files {
            match change.status.as_str() {
                "added" => categorized.added.push(change.clone()),
                "modified" => categorized.modified.push(change.clone()),
                "removed" => categorized.removed.push(change.clone()),
                "renamed" => categorized.renamed.push(change.clone()),
                _ => {}
            }
        }
        let summary = ChangeCounts {
            total_files: files.len(),
            added: categorized.added.len(),
            modified: categorized.modified.len(),
            removed: categorized.removed.len(),
            renamed: categorized.renamed.len(),
        };
        DiffSummary {
            files,
            summary,
            categorized,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CommentEntry {
    pub id: u64,
    pub author: Option<String>,
    pub text: String,
    pub created_on: Option<String>,
    pub deleted: bool,
}

impl From<&Comment> for CommentEntry {
    fn from(comment: &Comment) -> Self {
        CommentEntry {
            id: comment.id,
            author: comment
                .user
                .as_ref()
                .and_then(|user| user.label().map(String::from)),
            text: comment
                .content
                .as_ref()
                .map(|content| content.raw.clone())
                .unwrap_or_default(),
            created_on: comment.created_on.clone(),
            deleted: comment.deleted,
        }
    }
}

/// One activity feed entry reduced to kind + actor + date.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ActivityEntry {
    pub kind: String,
    pub actor: Option<String>,
    pub date: Option<String>,
    pub detail: Option<String>,
}

impl From<&ActivityItem> for ActivityEntry {
    fn from(item: &ActivityItem) -> Self {
        if let Some(update) = &item.update {
            return ActivityEntry {
                kind: "update".to_string(),
                actor: update
                    .author
                    .as_ref()
                    .and_then(|author| author.label().map(String::from)),
                date: update.date.clone(),
                detail: update.state.clone(),
            };
        }
        if let Some(approval) = &item.approval {
            return ActivityEntry {
                kind: "approval".to_string(),
                actor: approval
                    .user
                    .as_ref()
                    .and_then(|user| user.label().map(String::from)),
                date: approval.date.clone(),
                detail: None,
            };
        }
        if let Some(comment) = &item.comment {
            return ActivityEntry {
                kind: "comment".to_string(),
                actor: comment
                    .user
                    .as_ref()
                    .and_then(|user| user.label().map(String::from)),
                date: comment.created_on.clone(),
                detail: comment.content.as_ref().map(|content| content.raw.clone()),
            };
        }
        ActivityEntry {
            kind: "unknown".to_string(),
            actor: None,
            date: None,
            detail: None,
        }
    }
}

/// The full pull request composite: core record plus the three secondary
/// resources, any of which may have degraded to empty.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PullRequestDetail {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub state: String,
    pub author: Option<String>,
    pub source_branch: Option<String>,
    pub destination_branch: Option<String>,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
    pub close_source_branch: bool,
    pub reviewers: Vec<Reviewer>,
    pub participants: Vec<Reviewer>,
    pub file_changes: Vec<FileChange>,
    pub change_counts: ChangeCounts,
    pub comments: Vec<CommentEntry>,
    pub activity: Vec<ActivityEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_summary_categorization() {
        let entries: Vec<DiffStatEntry> = serde_json::from_str(
            r#"[
                {"status": "added", "lines_added": 10, "lines_removed": 0,
                 "new": {"path": "src/new.rs"}},
                {"status": "modified", "lines_added": 3, "lines_removed": 1,
                 "old": {"path": "src/lib.rs"}, "new": {"path": "src/lib.rs"}},
                {"status": "removed", "lines_added": 0, "lines_removed": 20,
                 "old": {"path": "src/dead.rs"}},
                {"status": "renamed", "lines_added": 0, "lines_removed": 0,
                 "old": {"path": "src/a.rs"}, "new": {"path": "src/b.rs"}},
                {"status": "modified", "lines_added": 1, "lines_removed": 1,
                 "old": {"path": "README.md"}, "new": {"path": "README.md"}}
            ]"#,
        )
        .unwrap();

        let summary = DiffSummary::from_entries(&entries);
        assert_eq!(summary.summary.total_files, 5);
        assert_eq!(summary.summary.added, 1);
        assert_eq!(summary.summary.modified, 2);
        assert_eq!(summary.summary.removed, 1);
        assert_eq!(summary.summary.renamed, 1);
        // Removed files fall back to the old path.
        assert_eq!(
            summary.categorized.removed[0].path.as_deref(),
            Some("src/dead.rs")
        );
        // Renames report both sides.
        assert_eq!(
            summary.categorized.renamed[0].old_path.as_deref(),
            Some("src/a.rs")
        );
        assert_eq!(
            summary.categorized.renamed[0].new_path.as_deref(),
            Some("src/b.rs")
        );
    }

    #[test]
    fn test_activity_projection() {
        let items: Vec<ActivityItem> = serde_json::from_str(
            r#"[
                {"update": {"state": "OPEN", "date": "d1",
                            "author": {"display_name": "Jane"}}},
                {"approval": {"date": "d2", "user": {"display_name": "Joe"}}},
                {"comment": {"id": 4, "created_on": "d3",
                             "user": {"display_name": "Ann"},
                             "content": {"raw": "lgtm"}}},
                {}
            ]"#,
        )
        .unwrap();

        let entries: Vec<ActivityEntry> = items.iter().map(ActivityEntry::from).collect();
        assert_eq!(entries[0].kind, "update");
        assert_eq!(entries[0].detail.as_deref(), Some("OPEN"));
        assert_eq!(entries[1].kind, "approval");
        assert_eq!(entries[1].actor.as_deref(), Some("Joe"));
        assert_eq!(entries[2].kind, "comment");
        assert_eq!(entries[2].detail.as_deref(), Some("lgtm"));
        assert_eq!(entries[3].kind, "unknown");
    }

    #[test]
    fn test_summary_projection_from_sparse_pr() {
        let pr: PullRequest = serde_json::from_str(
            r#"{"id": 9, "title": "Fix", "state": "OPEN",
                "source": {"branch": {"name": "fix/login"}},
                "author": {"nickname": "jd"}}"#,
        )
        .unwrap();
        let summary = PullRequestSummary::from(&pr);
        assert_eq!(summary.id, 9);
        assert_eq!(summary.author.as_deref(), Some("jd"));
        assert_eq!(summary.source_branch.as_deref(), Some("fix/login"));
        assert!(summary.destination_branch.is_none());
    }
}
