//! Diff payload models

use super::FileStatus;
use serde::{Deserialize, Serialize};

/// Unified two-file patch text
pub type UnifiedPatch = String;

/// Which status entries a diff request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffScope {
    /// Entries whose index differs from HEAD
    Staged,
    /// Entries whose working tree differs from HEAD
    Worktree,
    /// Union of both
    All,
}

/// Diff for a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFile {
    pub path: String,
    pub worktree_status: FileStatus,
    pub staged_status: FileStatus,
    pub is_staged: bool,
    pub is_untracked: bool,
    /// Always `None` when `is_binary` is set
    pub diff: Option<UnifiedPatch>,
    pub is_binary: bool,
    pub head_size: Option<usize>,
    pub worktree_size: Option<usize>,
}

/// Why a selected path was left out of `files`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Sensitive,
    Error,
}

/// A selected path that produced no diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
    pub message: String,
}

/// Result of one diff request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPayload {
    pub branch: Option<String>,
    pub scope: DiffScope,
    pub files: Vec<DiffFile>,
    pub skipped: Vec<SkippedFile>,
}

impl DiffPayload {
    pub fn empty(branch: Option<String>, scope: DiffScope) -> Self {
        Self {
            branch,
            scope,
            files: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.skipped.is_empty()
    }
}
