//! Working tree status models

use serde::{Deserialize, Serialize};

/// Status of one side of a path relative to HEAD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    Unmodified,
    Modified,
    Deleted,
    Added,
    Untracked,
    Absent,
}

/// One code of a raw status-matrix row, as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixCode {
    /// 0: no content on this side
    Absent,
    /// 1: same content as HEAD
    Unchanged,
    /// 2: content that differs from HEAD (or exists without HEAD)
    Changed,
    /// Anything else the backend may emit
    Unknown(u8),
}

impl From<u8> for MatrixCode {
    fn from(code: u8) -> Self {
        match code {
            0 => MatrixCode::Absent,
            1 => MatrixCode::Unchanged,
            2 => MatrixCode::Changed,
            other => MatrixCode::Unknown(other),
        }
    }
}

/// A raw row of the backend's three-way status matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub path: String,
    pub head: u8,
    pub worktree: u8,
    pub stage: u8,
}

impl StatusRow {
    pub fn new(path: impl Into<String>, head: u8, worktree: u8, stage: u8) -> Self {
        Self {
            path: path.into(),
            head,
            worktree,
            stage,
        }
    }
}

/// Classified status of a single path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub path: String,
    pub worktree_status: FileStatus,
    pub staged_status: FileStatus,
    pub is_staged: bool,
    pub is_untracked: bool,
}

impl StatusEntry {
    /// Whether the working tree differs from HEAD for this path
    pub fn has_worktree_change(&self) -> bool {
        !matches!(
            self.worktree_status,
            FileStatus::Unmodified | FileStatus::Absent
        )
    }
}

/// Summary counts over a status snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub staged: usize,
    /// Tracked paths whose working tree differs from HEAD
    pub worktree_changed: usize,
    pub untracked: usize,
}
