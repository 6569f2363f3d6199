//! Shared harness for pipeline integration tests.
//!
//! [`Harness`] owns temporary media, scratch and tool directories and builds
//! an [`IngestPipeline`] wired to fake `ffprobe`/`ffmpeg` scripts, so tests
//! never depend on the tools installed on the host. Unix only.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sg_av::{DurationProber, ScratchSpace, ToolRegistry, Transcoder};
use sg_core::config::Config;
use sg_pipeline::{FsMediaStore, IngestPipeline};
use tempfile::TempDir;

/// Prints a fixed duration.
pub const PROBE_3_2: &str = "echo 3.2";
/// Writes `AAC-ENCODED` to the last argument, the output path.
pub const ENCODE_OK: &str = r#"for last; do :; done; printf 'AAC-ENCODED' > "$last""#;
pub const ENCODED: &[u8] = b"AAC-ENCODED";

pub struct Harness {
    pub media: TempDir,
    pub scratch: TempDir,
    pub bin: TempDir,
    pub config: Config,
    tools: ToolRegistry,
}

impl Harness {
    /// No external tools available.
    pub fn new() -> Self {
        Self {
            media: tempfile::tempdir().unwrap(),
            scratch: tempfile::tempdir().unwrap(),
            bin: tempfile::tempdir().unwrap(),
            config: Config::default(),
            tools: ToolRegistry::empty(),
        }
    }

    /// Install a fake `ffprobe` running `body`.
    pub fn with_ffprobe(mut self, body: &str) -> Self {
        let path = fake_tool(self.bin.path(), "ffprobe", body);
        self.tools = self.tools.with_tool("ffprobe", path);
        self
    }

    /// Install a fake `ffmpeg` running `body`.
    pub fn with_ffmpeg(mut self, body: &str) -> Self {
        let path = fake_tool(self.bin.path(), "ffmpeg", body);
        self.tools = self.tools.with_tool("ffmpeg", path);
        self
    }

    pub fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            ScratchSpace::new(self.scratch.path()).unwrap(),
            DurationProber::new(&self.tools, &self.config.probe),
            Transcoder::new(&self.tools, &self.config.transcode),
            Arc::new(FsMediaStore::new(self.media.path())),
            &self.config.media,
        )
    }

    /// Number of entries left in the scratch directory.
    pub fn scratch_count(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }

    /// Absolute path of a stored artifact.
    pub fn stored(&self, relative: &Path) -> PathBuf {
        self.media.path().join(relative)
    }
}

pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
