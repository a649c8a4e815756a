//! Virtual filesystem capability used to read working-tree bytes

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::error::{GitStoreError, Result};

/// Hierarchical byte store addressed by repository-relative paths
#[async_trait]
pub trait VirtualFs: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Fails with `NotFound` when the file does not exist
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Entry names directly below `path`, sorted
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;
}

/// `VirtualFs` over a directory on the local disk
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a repository-relative path, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(GitStoreError::ValidationFailure(format!(
                "Path '{}' is outside the repository",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn map_io_error(path: &str, error: std::io::Error) -> GitStoreError {
    match error.kind() {
        std::io::ErrorKind::NotFound => GitStoreError::NotFound(path.to_string()),
        std::io::ErrorKind::PermissionDenied => GitStoreError::PermissionDenied(path.to_string()),
        _ => GitStoreError::Io(error),
    }
}

#[async_trait]
impl VirtualFs for LocalFs {
    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve(path)?;
        tokio::fs::try_exists(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        tokio::fs::read(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(path, e))?;
        }
        tokio::fs::write(&full_path, content)
            .await
            .map_err(|e| map_io_error(path, e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&full_path).await
        } else {
            tokio::fs::remove_file(&full_path).await
        };
        removed.map_err(|e| map_io_error(path, e))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let full_path = self.resolve(path)?;
        let mut reader = tokio::fs::read_dir(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io_error(path, e))? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}
