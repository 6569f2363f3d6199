//! Durable media storage.
//!
//! [`MediaStore`] is the seam between the pipeline and wherever artifacts
//! live. [`FsMediaStore`] writes under a root directory: each commit goes to
//! a uniquely-named staging file next to the destination, is synced, and is
//! then renamed over the canonical path. Concurrent commits to the same path
//! therefore resolve to last-writer-wins with no interleaved bytes.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

/// A byte store addressed by relative path.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` at `relative`, replacing anything already there.
    ///
    /// The bytes are readable through [`MediaStore::read`] as soon as this
    /// returns `Ok`.
    async fn commit(&self, relative: &Path, bytes: Bytes) -> sg_core::Result<()>;

    /// Read back the artifact at `relative`.
    async fn read(&self, relative: &Path) -> sg_core::Result<Bytes>;

    /// Whether an artifact exists at `relative`.
    async fn exists(&self, relative: &Path) -> bool;

    /// Remove the artifact at `relative` if it was last written before
    /// `cutoff`. Returns whether anything was removed; a missing artifact is
    /// not an error.
    async fn remove_stale(&self, relative: &Path, cutoff: SystemTime) -> sg_core::Result<bool>;
}

/// Filesystem-backed [`MediaStore`].
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `relative`, refusing anything that leaves the root.
    pub fn resolve(&self, relative: &Path) -> sg_core::Result<PathBuf> {
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || relative.as_os_str().is_empty() {
            return Err(sg_core::Error::storage(
                self.root.join(relative),
                io::Error::new(io::ErrorKind::InvalidInput, "path escapes the media root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn commit(&self, relative: &Path, bytes: Bytes) -> sg_core::Result<()> {
        let dest = self.resolve(relative)?;
        let target = dest.clone();

        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .map_err(|e| sg_core::Error::storage(&dest, io::Error::other(e)))?
            .map_err(|e| sg_core::Error::storage(&dest, e))?;

        tracing::info!("committed {}", dest.display());
        Ok(())
    }

    async fn read(&self, relative: &Path) -> sg_core::Result<Bytes> {
        let path = self.resolve(relative)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| sg_core::Error::storage(&path, e))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, relative: &Path) -> bool {
        match self.resolve(relative) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn remove_stale(&self, relative: &Path, cutoff: SystemTime) -> sg_core::Result<bool> {
        let path = self.resolve(relative)?;
        let modified = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.modified().map_err(|e| sg_core::Error::storage(&path, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(sg_core::Error::storage(&path, e)),
        };
        if modified >= cutoff {
            return Ok(false);
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(sg_core::Error::storage(&path, e)),
        }
    }
}

/// Write via a staging file in the destination directory, then rename.
fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
    std::fs::create_dir_all(parent)?;

    // The staging file is removed on drop if anything below fails.
    let mut staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempfile_in(parent)?;
    staging.write_all(bytes)?;
    staging.as_file().sync_all()?;
    staging.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
