//! Version-control backend capability
//!
//! The engine never touches git objects directly; everything below the
//! status matrix and the per-branch log is delegated to a `VcsBackend`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CommitEntry, StatusRow};
use crate::services::progress::ProgressObserver;

/// Identity used for a new commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// What a checkout should move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    /// Switch HEAD to a branch, tag or commit
    Ref(String),
    /// Restore the given paths from HEAD into index and worktree
    Paths(Vec<String>),
}

/// Object-level git plumbing consumed by the engine
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Short name of the checked-out branch, `None` when detached or unborn
    async fn resolve_current_branch(&self) -> Result<Option<String>>;

    /// Local branch names in the backend's listing order
    async fn list_branches(&self) -> Result<Vec<String>>;

    /// Raw `(path, head, worktree, stage)` codes for every known path
    async fn status_matrix(&self) -> Result<Vec<StatusRow>>;

    /// Ancestry of `reference`, newest first, at most `depth` commits
    async fn log(&self, reference: &str, depth: usize) -> Result<Vec<CommitEntry>>;

    /// Blob bytes of `path` in the tree of `reference`
    ///
    /// Fails with `NotFound` when either the reference or the path is absent.
    async fn read_blob(&self, reference: &str, path: &str) -> Result<Vec<u8>>;

    /// Stage the working-tree content of `path`
    async fn add(&self, path: &str) -> Result<()>;

    /// Remove `path` from the index
    async fn remove(&self, path: &str) -> Result<()>;

    /// Reset the index entry of `path` to HEAD
    async fn reset_index(&self, path: &str) -> Result<()>;

    async fn checkout(&self, target: &CheckoutTarget) -> Result<()>;

    /// Commit the index, returning the new commit id
    async fn commit(&self, message: &str, author: Option<&Author>) -> Result<String>;

    /// Create branch `name` at HEAD, optionally checking it out
    async fn branch(&self, name: &str, checkout: bool) -> Result<()>;

    /// Clone `url` into this backend's root
    async fn clone_into_root(
        &self,
        url: &str,
        reference: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<()>;

    /// Fetch `reference` from `remote` and integrate it into the current branch
    async fn pull(
        &self,
        remote: &str,
        reference: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<()>;
}
