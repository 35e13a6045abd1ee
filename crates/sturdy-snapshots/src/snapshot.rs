// snapshot.rs — The immutable record of a view's working tree at a moment
// in time.
//
// Snapshots form a per-workspace singly-linked list ordered by creation.
// The commit they name lives on `refs/snapshots/<workspaceID>`, which is
// never fast-forwarded into trunk and never pruned, so the object store
// retains every intermediate state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A plain working-tree backup.
    Snapshot,
    /// The view synced with its workspace (open, close, rebase).
    ViewSync,
    /// A suggestion's hunks were applied.
    SuggestionApply,
    /// Selected patches were undone.
    FileUndoPatch,
    /// Final state before the workspace landed on trunk.
    Land,
}

impl Action {
    pub fn code(&self) -> &'static str {
        match self {
            Action::Snapshot => "snapshot",
            Action::ViewSync => "view_sync",
            Action::SuggestionApply => "suggestion_apply",
            Action::FileUndoPatch => "file_undo_patch",
            Action::Land => "land",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One snapshot of one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub codebase_id: Uuid,
    /// The view the working tree lived in. Temporary views keep their
    /// `tmp-` id here.
    pub view_id: String,
    pub workspace_id: Uuid,
    pub action: Action,
    /// Resolves inside the codebase's trunk object database.
    pub commit_sha: String,
    /// Chain pointer to the snapshot this one superseded.
    pub previous_snapshot_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The ref a workspace's snapshots live on.
pub fn snapshot_ref(workspace_id: Uuid) -> String {
    format!("refs/snapshots/{workspace_id}")
}

/// Commit message for a snapshot commit:
/// `sturdy: <action> <workspaceID>` plus trailers identifying the chain.
pub fn commit_message(action: Action, workspace_id: Uuid, previous: Option<Uuid>) -> String {
    let previous = previous
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "sturdy: {action} {workspace_id}\n\n\
         Sturdy-Workspace: {workspace_id}\n\
         Sturdy-Action: {action}\n\
         Sturdy-Previous: {previous}",
        action = action.code(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_are_snake_case() {
        assert_eq!(Action::Snapshot.code(), "snapshot");
        assert_eq!(Action::SuggestionApply.code(), "suggestion_apply");
        assert_eq!(Action::FileUndoPatch.code(), "file_undo_patch");
    }

    #[test]
    fn action_serializes_as_its_code() {
        let json = serde_json::to_string(&Action::ViewSync).unwrap();
        assert_eq!(json, "\"view_sync\"");
    }

    #[test]
    fn commit_message_carries_trailers() {
        let ws = Uuid::new_v4();
        let prev = Uuid::new_v4();
        let message = commit_message(Action::Snapshot, ws, Some(prev));

        assert!(message.starts_with(&format!("sturdy: snapshot {ws}")));
        assert!(message.contains(&format!("Sturdy-Workspace: {ws}")));
        assert!(message.contains("Sturdy-Action: snapshot"));
        assert!(message.contains(&format!("Sturdy-Previous: {prev}")));
    }

    #[test]
    fn commit_message_without_previous_says_none() {
        let message = commit_message(Action::ViewSync, Uuid::new_v4(), None);
        assert!(message.contains("Sturdy-Previous: none"));
    }

    #[test]
    fn snapshot_record_round_trip() {
        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            codebase_id: Uuid::new_v4(),
            view_id: "v1".to_string(),
            workspace_id: Uuid::new_v4(),
            action: Action::Snapshot,
            commit_sha: "abc123".to_string(),
            previous_snapshot_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, snapshot.id);
        assert_eq!(restored.commit_sha, snapshot.commit_sha);
    }
}
