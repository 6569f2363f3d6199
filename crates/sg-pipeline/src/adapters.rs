//! Thin entry points for the two places songs are created: the public
//! upload form and the catalog admin. Both delegate to [`IngestPipeline`];
//! they only differ in how lyrics arrive and whether a stored duration is kept.

use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::artifact::StoredArtifact;
use crate::orchestrator::{IngestFailure, IngestPipeline};
use crate::request::{Lyrics, UploadRequest};

/// Catalog fields to write back onto the song record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongFields {
    /// Relative path of the stored audio, `/`-separated.
    pub audio_file: String,
    pub lyrics_file: Option<String>,
    /// Whole seconds, at least 1.
    pub duration: u32,
}

impl SongFields {
    fn from_artifact(artifact: &StoredArtifact, duration: u32) -> Self {
        Self {
            audio_file: artifact.relative_name(),
            lyrics_file: artifact
                .lyrics_path
                .as_deref()
                .map(crate::artifact::to_slash),
            duration,
        }
    }
}

/// A song submitted through the upload form.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub title: String,
    pub artist: String,
    /// Name the browser sent the file under.
    pub file_name: String,
    pub audio: Bytes,
    /// Timed lyrics pasted into the form.
    pub lyrics_text: Option<String>,
}

/// A song saved from the admin with its audio already on disk.
#[derive(Debug, Clone)]
pub struct AdminSave {
    pub title: String,
    pub artist: String,
    pub audio_path: PathBuf,
    /// Duration already on the record, if any.
    pub current_duration: Option<u32>,
    /// WebVTT lyrics attached in the admin.
    pub vtt: Option<String>,
}

/// Ingest an upload-form submission.
pub async fn upload_form(
    pipeline: &IngestPipeline,
    form: UploadForm,
) -> Result<(StoredArtifact, SongFields), IngestFailure> {
    let mut request = UploadRequest::from_bytes(form.audio, &form.file_name, form.artist, form.title);
    if let Some(text) = form.lyrics_text {
        request = request.with_lyrics(Lyrics::lrc(text));
    }

    let artifact = pipeline.ingest(request).await?;
    let fields = SongFields::from_artifact(&artifact, artifact.duration_secs());
    Ok((artifact, fields))
}

/// Ingest an admin save. A non-zero duration already on the record wins over
/// the probed one.
pub async fn admin_save(
    pipeline: &IngestPipeline,
    save: AdminSave,
) -> Result<(StoredArtifact, SongFields), IngestFailure> {
    let mut request = UploadRequest::from_file(save.audio_path, save.artist, save.title);
    if let Some(text) = save.vtt {
        request = request.with_lyrics(Lyrics::vtt(text));
    }

    let artifact = pipeline.ingest(request).await?;
    let duration = match save.current_duration {
        Some(secs) if secs > 0 => {
            tracing::debug!("keeping stored duration {secs}s over {}", artifact.duration);
            secs
        }
        _ => artifact.duration_secs(),
    };
    let fields = SongFields::from_artifact(&artifact, duration);
    Ok((artifact, fields))
}
