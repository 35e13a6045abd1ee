// notification.rs — User notification dispatch.
//
// The core only decides *when* someone must be told (a fresh suggestion,
// for now); delivery belongs to the outer layers. Implementations decide
// what to do with each notification; the always-on sink appends JSONL so
// nothing is lost when no delivery channel is wired up.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkspaceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewSuggestion,
}

/// Delivers notifications to users. Errors are logged by callers and never
/// stop the operation that triggered the notification.
pub trait NotificationSender: Send + Sync {
    fn notify_user(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        reference: &str,
    ) -> Result<(), WorkspaceError>;
}

/// Appends notifications as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    user_id: Uuid,
    kind: NotificationKind,
    reference: &'a str,
    at: chrono::DateTime<Utc>,
}

impl NotificationSender for LogSink {
    fn notify_user(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        reference: &str,
    ) -> Result<(), WorkspaceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| WorkspaceError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| WorkspaceError::IoError {
                path: self.path.clone(),
                source,
            })?;
        let json = serde_json::to_string(&LogLine {
            user_id,
            kind,
            reference,
            at: Utc::now(),
        })?;
        writeln!(file, "{json}").map_err(|source| WorkspaceError::IoError {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}
