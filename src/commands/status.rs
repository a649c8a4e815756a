//! Status classification
//!
//! Turns raw `(head, worktree, stage)` matrix rows into typed status entries.
//! Unknown codes never read as clean: they classify as `Modified`.

use crate::models::{FileStatus, MatrixCode, StatusEntry, StatusRow, StatusSummary};

/// Interpret one side of a row against the HEAD code
pub fn interpret(head: u8, value: u8) -> FileStatus {
    let head_present = MatrixCode::from(head) != MatrixCode::Absent;
    match MatrixCode::from(value) {
        MatrixCode::Absent if head_present => FileStatus::Deleted,
        MatrixCode::Absent => FileStatus::Absent,
        MatrixCode::Unchanged => FileStatus::Unmodified,
        MatrixCode::Changed if head_present => FileStatus::Modified,
        MatrixCode::Changed => FileStatus::Added,
        MatrixCode::Unknown(_) => FileStatus::Modified,
    }
}

/// Classify a single raw row
pub fn classify_row(row: &StatusRow) -> StatusEntry {
    let is_untracked = row.head == 0 && row.worktree == 2 && row.stage == 0;
    let worktree_status = if is_untracked {
        FileStatus::Untracked
    } else {
        interpret(row.head, row.worktree)
    };

    StatusEntry {
        path: row.path.clone(),
        worktree_status,
        staged_status: interpret(row.head, row.stage),
        is_staged: row.stage != row.head,
        is_untracked,
    }
}

/// Classify a whole matrix into the canonical, byte-wise path-sorted collection
///
/// A path reported more than once keeps its first row.
pub fn build_status_entries(rows: &[StatusRow]) -> Vec<StatusEntry> {
    let mut entries: Vec<StatusEntry> = rows.iter().map(classify_row).collect();
    entries.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    entries.dedup_by(|later, earlier| later.path == earlier.path);
    entries
}

/// Count staged, worktree-changed and untracked entries
pub fn summarize(entries: &[StatusEntry]) -> StatusSummary {
    StatusSummary {
        total: entries.len(),
        staged: entries.iter().filter(|e| e.is_staged).count(),
        worktree_changed: entries
            .iter()
            .filter(|e| !e.is_untracked && e.has_worktree_change())
            .count(),
        untracked: entries.iter().filter(|e| e.is_untracked).count(),
    }
}
