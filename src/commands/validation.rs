//! Preconditions checked before any mutating backend call

use crate::error::{GitStoreError, Result};
use crate::models::StatusEntry;

/// A commit message must contain something besides whitespace
pub fn validate_commit_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(GitStoreError::ValidationFailure(
            "Commit message cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// At least one entry must differ between index and HEAD
pub fn validate_has_staged(entries: &[StatusEntry]) -> Result<()> {
    if !entries.iter().any(|entry| entry.is_staged) {
        return Err(GitStoreError::ValidationFailure(
            "Nothing staged to commit".to_string(),
        ));
    }
    Ok(())
}

/// A new branch name must be a valid ref name not already in `existing`
pub fn validate_branch_name(name: &str, existing: &[String]) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GitStoreError::ValidationFailure(
            "Branch name cannot be empty".to_string(),
        ));
    }

    if !git2::Reference::is_valid_name(&format!("refs/heads/{}", name)) {
        return Err(GitStoreError::ValidationFailure(format!(
            "Invalid branch name: '{}'",
            name
        )));
    }

    if existing.iter().any(|branch| branch == name) {
        return Err(GitStoreError::ValidationFailure(format!(
            "Branch '{}' already exists",
            name
        )));
    }

    Ok(())
}

/// Path-based operations need at least one path
pub fn validate_paths(paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Err(GitStoreError::ValidationFailure(
            "No paths given".to_string(),
        ));
    }
    if paths.iter().any(|path| path.trim().is_empty()) {
        return Err(GitStoreError::ValidationFailure(
            "Path cannot be empty".to_string(),
        ));
    }
    Ok(())
}
