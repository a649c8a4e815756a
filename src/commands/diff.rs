//! Diff payload building
//!
//! Produces scoped, sensitivity- and binary-aware diffs of HEAD against the
//! working tree. Every selected path with a real difference lands in exactly
//! one of `files` or `skipped`.

use similar::TextDiff;

use crate::models::{DiffFile, DiffPayload, DiffScope, SkipReason, SkippedFile, StatusEntry};
use crate::services::backend::VcsBackend;
use crate::services::filesystem::VirtualFs;
use crate::utils::{is_probably_binary, is_sensitive_path};

/// Entries covered by `scope`, in their canonical order
pub fn select_entries(entries: &[StatusEntry], scope: DiffScope) -> Vec<&StatusEntry> {
    entries
        .iter()
        .filter(|entry| match scope {
            DiffScope::Staged => entry.is_staged,
            DiffScope::Worktree => entry.has_worktree_change(),
            DiffScope::All => entry.is_staged || entry.has_worktree_change(),
        })
        .collect()
}

enum Outcome {
    File(DiffFile),
    Unchanged,
    Skipped(SkippedFile),
}

/// Build the diff payload for `scope` over a status snapshot
///
/// Never fails as a whole: per-path failures become `SkipReason::Error`.
pub async fn build_diff_payload(
    backend: &dyn VcsBackend,
    fs: &dyn VirtualFs,
    entries: &[StatusEntry],
    scope: DiffScope,
    branch: Option<String>,
    context_lines: usize,
) -> DiffPayload {
    let mut payload = DiffPayload::empty(branch, scope);

    for entry in select_entries(entries, scope) {
        match diff_entry(backend, fs, entry, context_lines).await {
            Outcome::File(file) => payload.files.push(file),
            Outcome::Skipped(skipped) => payload.skipped.push(skipped),
            Outcome::Unchanged => {
                tracing::debug!("No content change for {}", entry.path);
            }
        }
    }

    tracing::debug!(
        "Diff payload ({:?}): {} files, {} skipped",
        scope,
        payload.files.len(),
        payload.skipped.len()
    );
    payload
}

async fn diff_entry(
    backend: &dyn VcsBackend,
    fs: &dyn VirtualFs,
    entry: &StatusEntry,
    context_lines: usize,
) -> Outcome {
    let path = entry.path.as_str();

    if is_sensitive_path(path) {
        tracing::debug!("Skipping sensitive path {}", path);
        return Outcome::Skipped(SkippedFile {
            path: path.to_string(),
            reason: SkipReason::Sensitive,
            message: "Sensitive file excluded from diff".to_string(),
        });
    }

    let head_bytes = match backend.read_blob("HEAD", path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.is_not_found() => None,
        Err(e) => return skip_with_error(path, "HEAD", e),
    };

    let work_bytes = match fs.read_file(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.is_not_found() => None,
        Err(e) => return skip_with_error(path, "working tree", e),
    };

    let mut is_binary = head_bytes.as_deref().is_some_and(is_probably_binary)
        || work_bytes.as_deref().is_some_and(is_probably_binary);

    let mut diff = None;
    if !is_binary {
        match (decode(head_bytes.as_deref()), decode(work_bytes.as_deref())) {
            (Some(old), Some(new)) => {
                if old == new {
                    return Outcome::Unchanged;
                }
                let new_label = if work_bytes.is_some() {
                    format!("{}@worktree", path)
                } else {
                    format!("{}@deleted", path)
                };
                diff = Some(unified_patch(
                    old,
                    new,
                    &format!("{}@HEAD", path),
                    &new_label,
                    context_lines,
                ));
            }
            _ => is_binary = true,
        }
    }

    Outcome::File(DiffFile {
        path: path.to_string(),
        worktree_status: entry.worktree_status,
        staged_status: entry.staged_status,
        is_staged: entry.is_staged,
        is_untracked: entry.is_untracked,
        diff,
        is_binary,
        head_size: head_bytes.as_ref().map(Vec::len),
        worktree_size: work_bytes.as_ref().map(Vec::len),
    })
}

fn skip_with_error(path: &str, side: &str, error: crate::error::GitStoreError) -> Outcome {
    tracing::warn!("Failed to read {} side of {}: {}", side, path, error);
    Outcome::Skipped(SkippedFile {
        path: path.to_string(),
        reason: SkipReason::Error,
        message: error.to_string(),
    })
}

/// Strict UTF-8 view of one side; an absent side reads as empty text
fn decode(bytes: Option<&[u8]>) -> Option<&str> {
    match bytes {
        Some(bytes) => std::str::from_utf8(bytes).ok(),
        None => Some(""),
    }
}

fn unified_patch(old: &str, new: &str, old_label: &str, new_label: &str, context: usize) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header(old_label, new_label)
        .to_string()
}
