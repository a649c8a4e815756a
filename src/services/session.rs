//! Repository session: the owner of cached status and commit log
//!
//! Reads share `op_lock`; every mutation holds it exclusively for the whole
//! reconcile, mutate, reconcile step so a second caller queues behind it.
//! Cached state lives in one `Arc<SessionSnapshot>` that is replaced whole.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::commands::validation::{
    validate_branch_name, validate_commit_message, validate_has_staged, validate_paths,
};
use crate::commands::{build_diff_payload, build_status_entries, reconstruct_graph, summarize};
use crate::config::EngineConfig;
use crate::error::{GitStoreError, Result};
use crate::models::{
    CommitEntry, CommitGraphModel, DiffPayload, DiffScope, StatusEntry, StatusSummary,
};
use crate::services::backend::{Author, CheckoutTarget, VcsBackend};
use crate::services::filesystem::{LocalFs, VirtualFs};
use crate::services::git2_backend::Git2Backend;
use crate::services::progress::{ProgressEvent, ProgressObserver};

/// Everything the session caches about the repository, computed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current_branch: Option<String>,
    pub branches: Vec<String>,
    /// Sorted byte-wise by path
    pub status: Vec<StatusEntry>,
    /// Newest first, at most `log_depth` entries
    pub commits: Vec<CommitEntry>,
}

pub struct RepositorySession {
    root: PathBuf,
    backend: Arc<dyn VcsBackend>,
    fs: Arc<dyn VirtualFs>,
    config: EngineConfig,
    op_lock: tokio::sync::RwLock<()>,
    snapshot: RwLock<Arc<SessionSnapshot>>,
    last_error: RwLock<Option<String>>,
}

impl RepositorySession {
    /// Open the repository at `root` on the local disk
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(root, EngineConfig::default()).await
    }

    pub async fn open_with_config(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        let root = root.into();
        let backend = Arc::new(Git2Backend::open(&root)?);
        let fs = Arc::new(LocalFs::new(&root));
        Self::with_collaborators(root, backend, fs, config).await
    }

    /// Session over arbitrary collaborators; performs the initial refresh
    pub async fn with_collaborators(
        root: impl Into<PathBuf>,
        backend: Arc<dyn VcsBackend>,
        fs: Arc<dyn VirtualFs>,
        config: EngineConfig,
    ) -> Result<Self> {
        let session = Self {
            root: root.into(),
            backend,
            fs,
            config,
            op_lock: tokio::sync::RwLock::new(()),
            snapshot: RwLock::new(Arc::new(SessionSnapshot::default())),
            last_error: RwLock::new(None),
        };

        let snapshot = session.reload().await?;
        tracing::info!(
            "Opened repository session at {} ({} paths, branch {:?})",
            session.root.display(),
            snapshot.status.len(),
            snapshot.current_branch
        );
        Ok(session)
    }

    /// Clone `url` into `dir` on the local disk and open a session on it
    pub async fn clone_repository(
        url: &str,
        dir: impl Into<PathBuf>,
        reference: Option<&str>,
        config: EngineConfig,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<Self> {
        let dir = dir.into();
        let backend = Arc::new(Git2Backend::new(&dir));
        let fs = Arc::new(LocalFs::new(&dir));
        Self::clone_with(url, dir, reference, backend, fs, config, observer).await
    }

    /// Clone through the given collaborators
    ///
    /// When the clone fails, a target directory created by it is removed and
    /// one that was empty beforehand is emptied again. Anything else is left
    /// untouched.
    pub async fn clone_with(
        url: &str,
        dir: PathBuf,
        reference: Option<&str>,
        backend: Arc<dyn VcsBackend>,
        fs: Arc<dyn VirtualFs>,
        config: EngineConfig,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<Self> {
        let existed = tokio::fs::try_exists(&dir).await.unwrap_or(true);
        let was_empty = existed && is_empty_dir(&dir).await;
        tracing::info!("Cloning {} into {}", url, dir.display());

        if let Err(e) = backend.clone_into_root(url, reference, observer).await {
            if !existed {
                cleanup_partial_clone(&dir).await;
            } else if was_empty {
                clear_partial_clone(&dir).await;
            }
            return Err(e);
        }

        let session = Self::with_collaborators(dir, backend, fs, config).await?;
        if let Some(observer) = observer {
            session.notify_refreshed(observer);
        }
        Ok(session)
    }

    /// End the session; cached state is dropped with it
    pub fn close(self) {
        tracing::info!("Closed repository session at {}", self.root.display());
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The latest cached state; never a mix of two refreshes
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_branch(&self) -> Option<String> {
        self.snapshot().current_branch.clone()
    }

    pub fn status_summary(&self) -> StatusSummary {
        summarize(&self.snapshot().status)
    }

    /// Message of the most recent failed operation, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recompute status, branches and commit log
    pub async fn refresh(&self) -> Result<Arc<SessionSnapshot>> {
        let _guard = self.op_lock.read().await;
        let result = self.reload().await;
        self.record(result)
    }

    /// Diff of HEAD against the working tree for `scope`, over fresh status
    pub async fn diff_payload(&self, scope: DiffScope) -> Result<DiffPayload> {
        let _guard = self.op_lock.read().await;
        let result = match self.reload().await {
            Ok(snapshot) => Ok(build_diff_payload(
                self.backend.as_ref(),
                self.fs.as_ref(),
                &snapshot.status,
                scope,
                snapshot.current_branch.clone(),
                self.config.context_lines,
            )
            .await),
            Err(e) => Err(e),
        };
        self.record(result)
    }

    /// Commit graph over every branch; `depth` defaults to `graphDepth`
    pub async fn commit_graph(&self, depth: Option<usize>) -> Result<CommitGraphModel> {
        let _guard = self.op_lock.read().await;
        let depth = depth.unwrap_or(self.config.graph_depth);
        let result = reconstruct_graph(self.backend.as_ref(), depth, &self.config).await;
        self.record(result)
    }

    /// Stage paths: present files are added, missing ones removed from the index
    pub async fn stage(&self, paths: &[String]) -> Result<()> {
        let _guard = self.op_lock.write().await;
        let result = self.stage_inner(paths).await;
        self.record(result)
    }

    async fn stage_inner(&self, paths: &[String]) -> Result<()> {
        validate_paths(paths)?;
        let outcome = self.stage_paths(paths).await;
        self.settle(outcome).await?;
        tracing::info!("Staged {} paths", paths.len());
        Ok(())
    }

    async fn stage_paths(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            if self.fs.exists(path).await? {
                self.backend.add(path).await?;
            } else {
                self.backend.remove(path).await?;
            }
        }
        Ok(())
    }

    /// Reset index entries back to HEAD
    pub async fn unstage(&self, paths: &[String]) -> Result<()> {
        let _guard = self.op_lock.write().await;
        let result = self.unstage_inner(paths).await;
        self.record(result)
    }

    async fn unstage_inner(&self, paths: &[String]) -> Result<()> {
        validate_paths(paths)?;
        let mut outcome = Ok(());
        for path in paths {
            outcome = self.backend.reset_index(path).await;
            if outcome.is_err() {
                break;
            }
        }
        self.settle(outcome).await?;
        tracing::info!("Unstaged {} paths", paths.len());
        Ok(())
    }

    /// Discard working-tree changes by checking paths out from HEAD
    pub async fn restore(&self, paths: &[String]) -> Result<()> {
        let _guard = self.op_lock.write().await;
        let result = self.restore_inner(paths).await;
        self.record(result)
    }

    async fn restore_inner(&self, paths: &[String]) -> Result<()> {
        validate_paths(paths)?;
        let outcome = self
            .backend
            .checkout(&CheckoutTarget::Paths(paths.to_vec()))
            .await;
        self.settle(outcome).await?;
        tracing::info!("Restored {} paths from HEAD", paths.len());
        Ok(())
    }

    /// Commit the index, returning the new commit id
    pub async fn commit(&self, message: &str, author: Option<&Author>) -> Result<String> {
        let _guard = self.op_lock.write().await;
        let result = self.commit_inner(message, author).await;
        self.record(result)
    }

    async fn commit_inner(&self, message: &str, author: Option<&Author>) -> Result<String> {
        validate_commit_message(message)?;
        let snapshot = self.reload().await?;
        validate_has_staged(&snapshot.status)?;

        let outcome = self.backend.commit(message, author).await;
        let oid = self.settle(outcome).await?;
        tracing::info!("Created commit {}", oid);
        Ok(oid)
    }

    /// Switch HEAD to a branch, tag or commit
    pub async fn checkout(&self, reference: &str) -> Result<()> {
        let _guard = self.op_lock.write().await;
        let result = self.checkout_inner(reference).await;
        self.record(result)
    }

    async fn checkout_inner(&self, reference: &str) -> Result<()> {
        if reference.trim().is_empty() {
            return Err(GitStoreError::ValidationFailure(
                "Reference cannot be empty".to_string(),
            ));
        }
        let outcome = self
            .backend
            .checkout(&CheckoutTarget::Ref(reference.to_string()))
            .await;
        self.settle(outcome).await?;
        tracing::info!("Checked out {}", reference);
        Ok(())
    }

    /// Create a branch at HEAD, optionally switching to it
    pub async fn create_branch(&self, name: &str, checkout: bool) -> Result<()> {
        let _guard = self.op_lock.write().await;
        let result = self.create_branch_inner(name, checkout).await;
        self.record(result)
    }

    async fn create_branch_inner(&self, name: &str, checkout: bool) -> Result<()> {
        validate_branch_name(name, &[])?;
        let snapshot = self.reload().await?;
        validate_branch_name(name, &snapshot.branches)?;

        let outcome = self.backend.branch(name, checkout).await;
        self.settle(outcome).await?;
        tracing::info!("Created branch {}", name);
        Ok(())
    }

    /// Fetch from `remote` and integrate into the current branch
    pub async fn pull(
        &self,
        remote: &str,
        reference: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<()> {
        let _guard = self.op_lock.write().await;
        let result = self.pull_inner(remote, reference, observer).await;
        self.record(result)
    }

    async fn pull_inner(
        &self,
        remote: &str,
        reference: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<()> {
        let outcome = self.backend.pull(remote, reference, observer).await;
        self.settle(outcome).await?;
        tracing::info!("Pulled from {}", remote);
        if let Some(observer) = observer {
            self.notify_refreshed(observer);
        }
        Ok(())
    }

    /// Recompute the snapshot and swap it in; callers hold `op_lock`
    async fn reload(&self) -> Result<Arc<SessionSnapshot>> {
        let current_branch = self.backend.resolve_current_branch().await?;
        let branches = self.backend.list_branches().await?;
        let rows = self.backend.status_matrix().await?;
        let status = build_status_entries(&rows);

        let log_ref = current_branch.as_deref().unwrap_or("HEAD");
        let commits = match self.backend.log(log_ref, self.config.log_depth).await {
            Ok(commits) => commits,
            Err(e) if e.is_not_found() => {
                tracing::debug!("No commits yet on {}", log_ref);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let snapshot = Arc::new(SessionSnapshot {
            current_branch,
            branches,
            status,
            commits,
        });
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        Ok(snapshot)
    }

    /// Reload once a mutating backend call has run, whether or not it
    /// succeeded; the mutation's own error takes precedence
    async fn settle<T>(&self, outcome: Result<T>) -> Result<T> {
        let reloaded = self.reload().await;
        match (outcome, reloaded) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(reload_error)) => {
                tracing::warn!("Reload after failed operation also failed: {}", reload_error);
                Err(e)
            }
        }
    }

    fn notify_refreshed(&self, observer: &dyn ProgressObserver) {
        let snapshot = self.snapshot();
        observer.on_progress(&ProgressEvent::Refreshed {
            entries: snapshot.status.len(),
            commits: snapshot.commits.len(),
        });
    }

    /// Keep the outcome's error message, or clear it on success
    fn record<T>(&self, result: Result<T>) -> Result<T> {
        let message = match &result {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Operation failed in {}: {}", self.root.display(), e);
                Some(e.to_string())
            }
        };
        *self
            .last_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = message;
        result
    }
}

async fn cleanup_partial_clone(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::info!("Removed partial clone at {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial clone at {}: {}", dir.display(), e),
    }
}

/// `false` when the directory cannot be read, so it is never cleared
async fn is_empty_dir(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

/// Remove whatever a failed clone left inside a directory that was empty before
async fn clear_partial_clone(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read partial clone at {}: {}", dir.display(), e);
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read partial clone at {}: {}", dir.display(), e);
                return;
            }
        };
        let path = entry.path();
        let removed = match entry.file_type().await {
            Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = removed {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
    tracing::info!("Cleared partial clone in {}", dir.display());
}
