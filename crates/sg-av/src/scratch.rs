//! Scratch file management for pipeline runs.
//!
//! A [`ScratchSpace`] hands out uniquely-named [`ScratchFile`]s inside a
//! scratch root. Each file is registered for release the moment it exists on
//! disk: dropping the handle deletes the file, so every exit path of a run
//! (normal return, `?` early return, panic unwind, a cancelled future) cleans
//! up after itself. Deletion failures are logged and never propagated.

use std::io;
use std::path::{Path, PathBuf};

/// Who is responsible for deleting a scratch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by the pipeline; deleted on release.
    Pipeline,
    /// Supplied by the caller; release leaves it in place.
    Caller,
}

/// A temporary file that is deleted when released or dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    ownership: Ownership,
    released: bool,
}

impl ScratchFile {
    /// Wrap a caller-owned file. The pipeline reads it but never deletes it.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ownership: Ownership::Caller,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Size of the file on disk, if it can be determined.
    pub async fn byte_size(&self) -> Option<u64> {
        tokio::fs::metadata(&self.path).await.ok().map(|m| m.len())
    }

    /// Release the file now instead of at drop.
    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.ownership == Ownership::Caller {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!("released scratch file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to remove scratch file {}: {e}",
                self.path.display()
            ),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Allocator for [`ScratchFile`]s under a single root directory.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    /// Use `root` as the scratch directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> sg_core::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(sg_core::Error::scratch)?;
        Ok(Self { root })
    }

    pub fn from_config(config: &sg_core::config::ScratchConfig) -> sg_core::Result<Self> {
        Self::new(config.dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new empty scratch file whose name ends with `suffix`
    /// (e.g. `".wav"`).
    pub fn acquire(&self, suffix: &str) -> sg_core::Result<ScratchFile> {
        let file = tempfile::Builder::new()
            .prefix("ingest-")
            .suffix(suffix)
            .tempfile_in(&self.root)
            .map_err(sg_core::Error::scratch)?;

        // Ownership of deletion moves from tempfile to ScratchFile, which logs
        // failures instead of ignoring them.
        let (_file, path) = file.keep().map_err(|e| sg_core::Error::scratch(e.error))?;

        Ok(ScratchFile {
            path,
            ownership: Ownership::Pipeline,
            released: false,
        })
    }

    /// Create a scratch file and fill it with `bytes`.
    pub async fn acquire_with(&self, suffix: &str, bytes: &[u8]) -> sg_core::Result<ScratchFile> {
        let scratch = self.acquire(suffix)?;
        // On failure `scratch` is dropped here, removing the partial file.
        tokio::fs::write(scratch.path(), bytes)
            .await
            .map_err(sg_core::Error::scratch)?;
        Ok(scratch)
    }
}
