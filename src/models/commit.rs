//! Commit models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the abbreviated commit id used for display
pub const SHORT_ID_LEN: usize = 7;

/// A commit as reported by the backend's log
///
/// Two entries with the same `oid` always describe the same commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub oid: String,
    /// First line of the commit message
    pub message: String,
    pub author: String,
    /// RFC 3339 author date, empty when unknown
    pub date: String,
    pub parents: Vec<String>,
    pub timestamp: Option<i64>,
}

impl CommitEntry {
    /// Abbreviated object id
    pub fn short_id(&self) -> &str {
        let end = self
            .oid
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map(|(idx, _)| idx)
            .unwrap_or(self.oid.len());
        &self.oid[..end]
    }

    /// Convert a git2 commit to our model
    pub fn from_git2(commit: &git2::Commit) -> Self {
        let author = commit.author();
        let name = author.name().unwrap_or("Unknown");
        let author_label = match author.email() {
            Some(email) if !email.is_empty() => format!("{} <{}>", name, email),
            _ => name.to_string(),
        };

        // Use the maximum of author/committer timestamps so rewritten commits
        // still sort after their parents.
        let timestamp = author.when().seconds().max(commit.committer().when().seconds());

        CommitEntry {
            oid: commit.id().to_string(),
            message: commit.summary().unwrap_or("").to_string(),
            author: author_label,
            date: format_date(author.when().seconds()),
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            timestamp: Some(timestamp),
        }
    }
}

fn format_date(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|date| date.to_rfc3339())
        .unwrap_or_default()
}
