//! The result of a successful ingestion.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sg_av::TranscodeKind;
use sg_core::{Container, ProbeResult};
use uuid::Uuid;

/// Non-fatal issues found while ingesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    /// Encoding failed and the artifact was stored in its original container.
    ContainerMismatch {
        expected: Container,
        actual: Container,
        reason: String,
    },
    /// The audio was stored but its lyrics sidecar was not.
    LyricsNotStored { reason: String },
}

/// A committed artifact, ready for the catalog to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub ingest_id: Uuid,
    /// Path relative to the media root.
    pub relative_path: PathBuf,
    /// URL the catalog serves the artifact under.
    pub url: String,
    /// `"Artist - Title"`.
    pub display_name: String,
    /// Container of the stored bytes.
    pub container: Container,
    pub duration: ProbeResult,
    /// Size of the stored bytes.
    pub size: u64,
    pub transcode: TranscodeKind,
    /// Relative path of the lyrics sidecar, when one was stored.
    pub lyrics_path: Option<PathBuf>,
    pub warnings: Vec<IngestWarning>,
    pub committed_at: DateTime<Utc>,
}

impl StoredArtifact {
    pub fn duration_secs(&self) -> u32 {
        self.duration.seconds()
    }

    /// Whether the stored bytes are in the canonical container.
    pub fn is_canonical(&self) -> bool {
        self.container.is_canonical()
    }

    /// Relative path with `/` separators, as stored in catalog file fields.
    pub fn relative_name(&self) -> String {
        to_slash(&self.relative_path)
    }
}

pub(crate) fn to_slash(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
