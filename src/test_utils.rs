//! Test utilities: temporary git repositories and in-memory collaborators

#![cfg(test)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

use crate::error::{GitStoreError, Result};
use crate::models::{CommitEntry, StatusRow};
use crate::services::backend::{Author, CheckoutTarget, VcsBackend};
use crate::services::filesystem::VirtualFs;
use crate::services::progress::ProgressObserver;

/// A temporary git repository for testing
pub struct TestRepo {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new empty git repository
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();

        let repo = git2::Repository::init(&path).expect("Failed to init repo");

        // Configure user for commits
        let mut config = repo.config().expect("Failed to get config");
        config
            .set_str("user.name", "Test User")
            .expect("Failed to set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("Failed to set user.email");

        Self { dir, path }
    }

    /// Create a repository with an initial commit
    pub fn with_initial_commit() -> Self {
        let test_repo = Self::new();
        test_repo.create_commit("Initial commit", &[("README.md", "# Test Repo")]);
        test_repo
    }

    /// Get the repository path as a string
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Get the git2 repository
    pub fn repo(&self) -> git2::Repository {
        git2::Repository::open(&self.path).expect("Failed to open repo")
    }

    /// Create a file with content
    pub fn create_file(&self, name: &str, content: &str) {
        self.create_file_bytes(name, content.as_bytes());
    }

    /// Create a file with raw bytes
    pub fn create_file_bytes(&self, name: &str, content: &[u8]) {
        let file_path = self.path.join(name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Delete a file from the working tree
    pub fn delete_file(&self, name: &str) {
        std::fs::remove_file(self.path.join(name)).expect("Failed to delete file");
    }

    /// Stage a file
    pub fn stage_file(&self, name: &str) {
        let repo = self.repo();
        let mut index = repo.index().expect("Failed to get index");
        index
            .add_path(std::path::Path::new(name))
            .expect("Failed to stage file");
        index.write().expect("Failed to write index");
    }

    /// Stage the removal of a file
    pub fn unstage_removed(&self, name: &str) {
        let repo = self.repo();
        let mut index = repo.index().expect("Failed to get index");
        index
            .remove_path(std::path::Path::new(name))
            .expect("Failed to remove from index");
        index.write().expect("Failed to write index");
    }

    /// Create a commit with the given files
    pub fn create_commit(&self, message: &str, files: &[(&str, &str)]) -> git2::Oid {
        let repo = self.repo();

        for (name, content) in files {
            self.create_file(name, content);
            self.stage_file(name);
        }

        let mut index = repo.index().expect("Failed to get index");
        let tree_oid = index.write_tree().expect("Failed to write tree");
        let tree = repo.find_tree(tree_oid).expect("Failed to find tree");
        let sig = repo.signature().expect("Failed to get signature");

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Merge `branch` into the current branch with an explicit merge commit
    pub fn merge_branch(&self, branch: &str, message: &str) -> git2::Oid {
        let repo = self.repo();
        let head = repo
            .head()
            .expect("Failed to get HEAD")
            .peel_to_commit()
            .expect("Failed to get commit");
        let other = repo
            .find_branch(branch, git2::BranchType::Local)
            .expect("Failed to find branch")
            .get()
            .peel_to_commit()
            .expect("Failed to get branch commit");

        let mut index = repo
            .merge_commits(&head, &other, None)
            .expect("Failed to merge commits");
        let tree_oid = index.write_tree_to(&repo).expect("Failed to write tree");
        let tree = repo.find_tree(tree_oid).expect("Failed to find tree");
        let sig = repo.signature().expect("Failed to get signature");

        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head, &other])
            .expect("Failed to create merge commit");
        repo.checkout_head(Some(git2::build::CheckoutBuilder::default().force()))
            .expect("Failed to checkout merge");
        oid
    }

    /// Create a branch at the current HEAD
    pub fn create_branch(&self, name: &str) -> git2::Oid {
        let repo = self.repo();
        let head = repo.head().expect("Failed to get HEAD");
        let commit = head.peel_to_commit().expect("Failed to get commit");
        repo.branch(name, &commit, false)
            .expect("Failed to create branch");
        commit.id()
    }

    /// Checkout a branch
    pub fn checkout_branch(&self, name: &str) {
        let repo = self.repo();
        let branch = repo
            .find_branch(name, git2::BranchType::Local)
            .expect("Failed to find branch");
        let obj = branch
            .get()
            .peel(git2::ObjectType::Commit)
            .expect("Failed to peel");
        repo.checkout_tree(&obj, None).expect("Failed to checkout");
        repo.set_head(branch.get().name().unwrap())
            .expect("Failed to set HEAD");
    }

    /// Get the current branch name
    pub fn current_branch(&self) -> String {
        let repo = self.repo();
        let head = repo.head().expect("Failed to get HEAD");
        head.shorthand().unwrap_or("").to_string()
    }

    /// Get the HEAD commit OID
    pub fn head_oid(&self) -> git2::Oid {
        let repo = self.repo();
        let head = repo.head().expect("Failed to get HEAD");
        head.target().expect("Failed to get target")
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a commit entry with a synthetic id
pub fn commit_entry(oid: &str, parents: &[&str], message: &str) -> CommitEntry {
    CommitEntry {
        oid: oid.to_string(),
        message: message.to_string(),
        author: "Test User <test@example.com>".to_string(),
        date: String::new(),
        parents: parents.iter().map(|p| p.to_string()).collect(),
        timestamp: None,
    }
}

/// Scripted in-memory backend that records every call it receives
#[derive(Default)]
pub struct FakeBackend {
    pub current_branch: Mutex<Option<String>>,
    pub branches: Mutex<Vec<String>>,
    pub rows: Mutex<Vec<StatusRow>>,
    /// Newest-first logs by branch name
    pub logs: Mutex<HashMap<String, Vec<CommitEntry>>>,
    /// HEAD blobs by path
    pub head_blobs: Mutex<HashMap<String, Vec<u8>>>,
    pub failing_blobs: Mutex<HashSet<String>>,
    /// Paths whose `add` fails
    pub failing_paths: Mutex<HashSet<String>>,
    pub blob_reads: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current_branch(self, name: &str) -> Self {
        *self.current_branch.lock().unwrap() = Some(name.to_string());
        self
    }

    /// Register a branch with its newest-first log
    pub fn with_branch(self, name: &str, log: Vec<CommitEntry>) -> Self {
        self.branches.lock().unwrap().push(name.to_string());
        self.logs.lock().unwrap().insert(name.to_string(), log);
        self
    }

    pub fn with_rows(self, rows: Vec<StatusRow>) -> Self {
        *self.rows.lock().unwrap() = rows;
        self
    }

    pub fn with_head_blob(self, path: &str, content: &[u8]) -> Self {
        self.head_blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    pub fn with_failing_blob(self, path: &str) -> Self {
        self.failing_blobs.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn blob_reads(&self) -> Vec<String> {
        self.blob_reads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VcsBackend for FakeBackend {
    async fn resolve_current_branch(&self) -> Result<Option<String>> {
        Ok(self.current_branch.lock().unwrap().clone())
    }

    async fn list_branches(&self) -> Result<Vec<String>> {
        Ok(self.branches.lock().unwrap().clone())
    }

    async fn status_matrix(&self) -> Result<Vec<StatusRow>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn log(&self, reference: &str, depth: usize) -> Result<Vec<CommitEntry>> {
        let reference = if reference == "HEAD" {
            self.current_branch
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_default()
        } else {
            reference.to_string()
        };
        self.logs
            .lock()
            .unwrap()
            .get(&reference)
            .map(|log| log.iter().take(depth).cloned().collect())
            .ok_or_else(|| GitStoreError::NotFound(format!("Unknown reference: {}", reference)))
    }

    async fn read_blob(&self, _reference: &str, path: &str) -> Result<Vec<u8>> {
        self.blob_reads.lock().unwrap().push(path.to_string());
        if self.failing_blobs.lock().unwrap().contains(path) {
            return Err(GitStoreError::BackendFailure(format!("corrupt blob: {}", path)));
        }
        self.head_blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| GitStoreError::NotFound(path.to_string()))
    }

    async fn add(&self, path: &str) -> Result<()> {
        if self.failing_paths.lock().unwrap().contains(path) {
            return Err(GitStoreError::BackendFailure(format!("cannot add: {}", path)));
        }
        self.record(format!("add:{}", path));
        // The index now holds the worktree content
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.path == path {
                row.stage = row.worktree;
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.record(format!("remove:{}", path));
        Ok(())
    }

    async fn reset_index(&self, path: &str) -> Result<()> {
        self.record(format!("reset:{}", path));
        Ok(())
    }

    async fn checkout(&self, target: &CheckoutTarget) -> Result<()> {
        match target {
            CheckoutTarget::Ref(name) => {
                self.record(format!("checkout:{}", name));
                *self.current_branch.lock().unwrap() = Some(name.clone());
            }
            CheckoutTarget::Paths(paths) => {
                self.record(format!("restore:{}", paths.join(",")));
            }
        }
        Ok(())
    }

    async fn commit(&self, message: &str, _author: Option<&Author>) -> Result<String> {
        self.record(format!("commit:{}", message));
        Ok("f00dfacef00dfacef00dfacef00dfacef00dface".to_string())
    }

    async fn branch(&self, name: &str, checkout: bool) -> Result<()> {
        self.record(format!("branch:{}", name));
        self.branches.lock().unwrap().push(name.to_string());
        if checkout {
            *self.current_branch.lock().unwrap() = Some(name.to_string());
        }
        Ok(())
    }

    async fn clone_into_root(
        &self,
        url: &str,
        _reference: Option<&str>,
        _observer: Option<&dyn ProgressObserver>,
    ) -> Result<()> {
        self.record(format!("clone:{}", url));
        Ok(())
    }

    async fn pull(
        &self,
        remote: &str,
        _reference: Option<&str>,
        _observer: Option<&dyn ProgressObserver>,
    ) -> Result<()> {
        self.record(format!("pull:{}", remote));
        Ok(())
    }
}

/// In-memory working tree
#[derive(Default)]
pub struct MemoryFs {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub denied: Mutex<HashSet<String>>,
    pub reads: Mutex<Vec<String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    pub fn with_denied(self, path: &str) -> Self {
        self.denied.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl VirtualFs for MemoryFs {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.reads.lock().unwrap().push(path.to_string());
        if self.denied.lock().unwrap().contains(path) {
            return Err(GitStoreError::PermissionDenied(path.to_string()));
        }
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| GitStoreError::NotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| GitStoreError::NotFound(path.to_string()))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path.trim_end_matches('/'))
        };
        let mut names: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_repo() {
        let repo = TestRepo::new();
        assert!(repo.path.exists());
        assert!(repo.path.join(".git").exists());
    }

    #[test]
    fn test_merge_branch_has_two_parents() {
        let repo = TestRepo::with_initial_commit();
        let main = repo.current_branch();
        repo.create_branch("feature");
        repo.checkout_branch("feature");
        repo.create_commit("Feature work", &[("feature.txt", "f")]);
        repo.checkout_branch(&main);
        repo.create_commit("Main work", &[("main.txt", "m")]);

        let oid = repo.merge_branch("feature", "Merge feature");
        let git_repo = repo.repo();
        let commit = git_repo.find_commit(oid).unwrap();
        assert_eq!(commit.parent_count(), 2);
        assert!(repo.path.join("feature.txt").exists());
    }

    #[tokio::test]
    async fn test_memory_fs_list_dir() {
        let fs = MemoryFs::new()
            .with_file("a.txt", b"a")
            .with_file("dir/b.txt", b"b")
            .with_file("dir/c.txt", b"c");
        assert_eq!(fs.list_dir("").await.unwrap(), vec!["a.txt", "dir"]);
        assert_eq!(fs.list_dir("dir").await.unwrap(), vec!["b.txt", "c.txt"]);
    }
}
