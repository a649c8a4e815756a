//! `VcsBackend` implementation over libgit2

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{GitStoreError, Result};
use crate::models::{CommitEntry, StatusRow};
use crate::services::backend::{Author, CheckoutTarget, VcsBackend};
use crate::services::progress::{ProgressEvent, ProgressObserver};

/// Index entry flag bits holding the conflict stage
const INDEX_STAGE_MASK: u16 = 0x3000;

/// Backend over a repository on the local disk
///
/// The repository is opened per call, so the backend itself holds no handle.
#[derive(Debug, Clone)]
pub struct Git2Backend {
    root: PathBuf,
}

impl Git2Backend {
    /// Backend for `root`, which need not exist yet (e.g. a clone target)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backend for an existing repository
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(GitStoreError::NotFound(format!(
                "Repository not found: {}",
                root.display()
            )));
        }
        git2::Repository::open(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo(&self) -> Result<git2::Repository> {
        Ok(git2::Repository::open(&self.root)?)
    }
}

fn is_missing(error: &git2::Error) -> bool {
    matches!(
        error.code(),
        git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch
    )
}

/// Resolve a commit-ish string (OID, branch name, tag, HEAD~N, etc.) to a commit
fn resolve_commit<'repo>(
    repo: &'repo git2::Repository,
    commit_ish: &str,
) -> Result<git2::Commit<'repo>> {
    let object = repo.revparse_single(commit_ish).map_err(|e| {
        if is_missing(&e) {
            GitStoreError::NotFound(format!("Cannot resolve reference: {}", commit_ish))
        } else {
            GitStoreError::Git(e)
        }
    })?;
    object.peel_to_commit().map_err(|_| {
        GitStoreError::NotFound(format!("Reference is not a commit: {}", commit_ish))
    })
}

/// Tree of HEAD, `None` on an unborn branch
fn head_tree(repo: &git2::Repository) -> Result<Option<git2::Tree<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?)),
        Err(e) if is_missing(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn fetch_options<'a>(observer: Option<&'a dyn ProgressObserver>) -> git2::FetchOptions<'a> {
    let mut callbacks = git2::RemoteCallbacks::new();
    if let Some(observer) = observer {
        callbacks.transfer_progress(move |stats| {
            observer.on_progress(&ProgressEvent::Transfer {
                received_objects: stats.received_objects(),
                total_objects: stats.total_objects(),
                received_bytes: stats.received_bytes(),
            });
            true
        });
    }

    let mut options = git2::FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

fn checkout_builder<'a>(
    observer: Option<&'a dyn ProgressObserver>,
) -> git2::build::CheckoutBuilder<'a> {
    let mut builder = git2::build::CheckoutBuilder::new();
    if let Some(observer) = observer {
        builder.progress(move |_path, completed, total| {
            observer.on_progress(&ProgressEvent::Checkout { completed, total });
        });
    }
    builder
}

fn worktree_changed(status: git2::Status) -> bool {
    status.intersects(
        git2::Status::WT_NEW
            | git2::Status::WT_MODIFIED
            | git2::Status::WT_TYPECHANGE
            | git2::Status::WT_RENAMED,
    )
}

#[async_trait]
impl VcsBackend for Git2Backend {
    async fn resolve_current_branch(&self) -> Result<Option<String>> {
        let repo = self.repo()?;
        let current = match repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(|s| s.to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                // HEAD still names the branch the first commit will create
                let head = repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(|name| name.to_string()))
            }
            Err(e) => Err(e.into()),
        };
        current
    }

    async fn list_branches(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let mut names = Vec::new();
        for branch in repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn status_matrix(&self) -> Result<Vec<StatusRow>> {
        let repo = self.repo()?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                GitStoreError::BackendFailure("Bare repository has no working tree".to_string())
            })?
            .to_path_buf();

        let mut head_oids: BTreeMap<String, git2::Oid> = BTreeMap::new();
        if let Some(tree) = head_tree(&repo)? {
            tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(git2::ObjectType::Blob) {
                    if let Some(name) = entry.name() {
                        head_oids.insert(format!("{}{}", root, name), entry.id());
                    }
                }
                git2::TreeWalkResult::Ok
            })?;
        }

        let index = repo.index()?;
        let mut index_oids: BTreeMap<String, git2::Oid> = BTreeMap::new();
        for entry in index.iter() {
            if entry.flags & INDEX_STAGE_MASK != 0 {
                continue;
            }
            index_oids.insert(String::from_utf8_lossy(&entry.path).to_string(), entry.id);
        }

        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .include_unmodified(false);
        let statuses = repo.statuses(Some(&mut opts))?;

        let mut changed: BTreeMap<String, git2::Status> = BTreeMap::new();
        for entry in statuses.iter() {
            if let Some(path) = entry.path() {
                changed.insert(path.to_string(), entry.status());
            }
        }

        let paths: BTreeSet<&String> = head_oids
            .keys()
            .chain(index_oids.keys())
            .chain(changed.keys())
            .collect();

        let mut rows = Vec::with_capacity(paths.len());
        for path in paths {
            let head_oid = head_oids.get(path).copied();
            let index_oid = index_oids.get(path).copied();
            let status = changed.get(path).copied().unwrap_or(git2::Status::CURRENT);

            let worktree_oid = if status.contains(git2::Status::WT_DELETED) {
                None
            } else if worktree_changed(status) || index_oid.is_none() {
                let full_path = workdir.join(path);
                if full_path.is_file() {
                    Some(git2::Oid::hash_file(git2::ObjectType::Blob, &full_path)?)
                } else {
                    None
                }
            } else {
                index_oid
            };

            let head = u8::from(head_oid.is_some());
            let worktree = match worktree_oid {
                None => 0,
                Some(oid) if Some(oid) == head_oid => 1,
                Some(_) => 2,
            };
            let stage = match index_oid {
                None => 0,
                Some(oid) if Some(oid) == head_oid => 1,
                Some(oid) if Some(oid) == worktree_oid => 2,
                Some(_) => 3,
            };

            rows.push(StatusRow::new(path.clone(), head, worktree, stage));
        }

        Ok(rows)
    }

    async fn log(&self, reference: &str, depth: usize) -> Result<Vec<CommitEntry>> {
        let repo = self.repo()?;
        let start = resolve_commit(&repo, reference)?;

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        revwalk.push(start.id())?;

        let mut commits = Vec::new();
        for oid in revwalk.take(depth) {
            let commit = repo.find_commit(oid?)?;
            commits.push(CommitEntry::from_git2(&commit));
        }
        Ok(commits)
    }

    async fn read_blob(&self, reference: &str, path: &str) -> Result<Vec<u8>> {
        let repo = self.repo()?;
        let commit = resolve_commit(&repo, reference)?;
        let tree = commit.tree()?;

        // Normalize path separators to forward slashes for git
        let normalized_path = path.replace('\\', "/");
        let entry = tree.get_path(Path::new(&normalized_path)).map_err(|_| {
            GitStoreError::NotFound(format!("File '{}' not found in {}", path, reference))
        })?;

        let object = entry.to_object(&repo)?;
        let blob = object.into_blob().map_err(|_| {
            GitStoreError::NotFound(format!("'{}' is not a file in {}", path, reference))
        })?;
        Ok(blob.content().to_vec())
    }

    async fn add(&self, path: &str) -> Result<()> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        index.add_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        index.remove_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    async fn reset_index(&self, path: &str) -> Result<()> {
        let repo = self.repo()?;
        match repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit()?;
                repo.reset_default(Some(commit.as_object()), [path])?;
            }
            Err(e) if is_missing(&e) => {
                // Nothing committed yet: unstaging means dropping the entry
                let mut index = repo.index()?;
                index.remove_path(Path::new(path))?;
                index.write()?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn checkout(&self, target: &CheckoutTarget) -> Result<()> {
        let repo = self.repo()?;
        match target {
            CheckoutTarget::Ref(name) => {
                if let Ok(branch) = repo.find_branch(name, git2::BranchType::Local) {
                    let reference = branch.get();
                    let object = reference.peel(git2::ObjectType::Commit)?;
                    repo.checkout_tree(&object, None)?;
                    let refname = reference.name().ok_or_else(|| {
                        GitStoreError::BackendFailure(format!("Invalid branch name: {}", name))
                    })?;
                    repo.set_head(refname)?;
                } else {
                    let commit = resolve_commit(&repo, name)?;
                    repo.checkout_tree(commit.as_object(), None)?;
                    repo.set_head_detached(commit.id())?;
                }
            }
            CheckoutTarget::Paths(paths) => {
                let mut builder = git2::build::CheckoutBuilder::new();
                builder.force();
                for path in paths {
                    builder.path(path.as_str());
                }
                repo.checkout_head(Some(&mut builder))?;
            }
        }
        Ok(())
    }

    async fn commit(&self, message: &str, author: Option<&Author>) -> Result<String> {
        let repo = self.repo()?;

        let signature = match author {
            Some(author) => git2::Signature::now(&author.name, &author.email)?,
            None => repo.signature()?,
        };
        let mut index = repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();

        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        Ok(oid.to_string())
    }

    async fn branch(&self, name: &str, checkout: bool) -> Result<()> {
        let repo = self.repo()?;
        let commit = repo.head()?.peel_to_commit()?;
        let branch = repo.branch(name, &commit, false)?;

        if checkout {
            let reference = branch.get();
            let object = reference.peel(git2::ObjectType::Commit)?;
            repo.checkout_tree(&object, None)?;
            let refname = reference.name().ok_or_else(|| {
                GitStoreError::BackendFailure(format!("Invalid branch name: {}", name))
            })?;
            repo.set_head(refname)?;
        }
        Ok(())
    }

    async fn clone_into_root(
        &self,
        url: &str,
        reference: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<()> {
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_options(observer));
        builder.with_checkout(checkout_builder(observer));
        if let Some(reference) = reference {
            builder.branch(reference);
        }

        builder.clone(url, &self.root)?;
        Ok(())
    }

    async fn pull(
        &self,
        remote: &str,
        reference: Option<&str>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<()> {
        let branch_name = match reference {
            Some(name) => name.to_string(),
            None => self.resolve_current_branch().await?.ok_or_else(|| {
                GitStoreError::BackendFailure("Cannot pull without a current branch".to_string())
            })?,
        };

        let repo = self.repo()?;

        let mut remote_handle = repo
            .find_remote(remote)
            .map_err(|_| GitStoreError::NotFound(format!("Remote not found: {}", remote)))?;
        let refspecs: Vec<String> = remote_handle
            .fetch_refspecs()?
            .iter()
            .filter_map(|s| s.map(|s| s.to_string()))
            .collect();
        let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
        remote_handle.fetch(&refspec_strs, Some(&mut fetch_options(observer)), None)?;

        let remote_ref = format!("{}/{}", remote, branch_name);
        let fetch_head = repo
            .find_reference(&format!("refs/remotes/{}", remote_ref))
            .map_err(|_| GitStoreError::NotFound(format!("Remote branch not found: {}", remote_ref)))?;
        let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;

        let (analysis, _preference) = repo.merge_analysis(&[&fetch_commit])?;
        let refname = format!("refs/heads/{}", branch_name);

        if analysis.is_up_to_date() {
            tracing::debug!("{} is already up to date with {}", branch_name, remote_ref);
        } else if analysis.is_fast_forward() || analysis.is_unborn() {
            // Move the worktree first; a safe checkout refuses to overwrite local edits
            let target = repo.find_object(fetch_commit.id(), None)?;
            let mut checkout = checkout_builder(observer);
            checkout.safe();
            repo.checkout_tree(&target, Some(&mut checkout))
                .map_err(|e| {
                    GitStoreError::BackendFailure(format!(
                        "Pulling {} would overwrite local changes: {}",
                        remote_ref,
                        e.message()
                    ))
                })?;

            match repo.find_reference(&refname) {
                Ok(mut local) => {
                    local.set_target(fetch_commit.id(), "Fast-forward")?;
                }
                Err(_) => {
                    repo.reference(&refname, fetch_commit.id(), true, "Fast-forward")?;
                }
            }
            repo.set_head(&refname)?;
        } else {
            repo.merge(&[&fetch_commit], None, None)?;

            if repo.index()?.has_conflicts() {
                return Err(GitStoreError::BackendFailure(format!(
                    "Merge conflict while pulling {}",
                    remote_ref
                )));
            }

            let signature = repo.signature()?;
            let head = repo.head()?.peel_to_commit()?;
            let remote_commit = repo.find_commit(fetch_commit.id())?;
            let tree_oid = repo.index()?.write_tree()?;
            let tree = repo.find_tree(tree_oid)?;

            repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                &format!("Merge {} into {}", remote_ref, branch_name),
                &tree,
                &[&head, &remote_commit],
            )?;

            repo.cleanup_state()?;
        }

        Ok(())
    }
}
